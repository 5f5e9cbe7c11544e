use crate::linalg;

/// Compute the rotation matrix about the camera vertical axis.
///
/// In the rectified camera frame (x right, y down, z forward) an object's
/// heading `ry` is a rotation about `y`. The matrix is
///
/// ```text
/// [ cos(ry)  0  sin(ry) ]
/// [    0     1     0    ]
/// [-sin(ry)  0  cos(ry) ]
/// ```
///
/// # Arguments
///
/// * `ry` - The rotation angle in radians. Any finite value is accepted.
///
/// Example:
///
/// ```
/// use kitti_3d::transforms::ry_to_rotation_matrix;
///
/// let rotation = ry_to_rotation_matrix(0.0);
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn ry_to_rotation_matrix(ry: f64) -> [[f64; 3]; 3] {
    let (s, c) = ry.sin_cos();
    [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

/// Check whether a 3x3 matrix is a proper rotation within `tolerance`.
///
/// Tests `R * Rᵗ = I` element-wise and `det(R) = 1`.
pub fn is_rotation_matrix(m: &[[f64; 3]; 3], tolerance: f64) -> bool {
    let mut m_mt = [[0.0; 3]; 3];
    linalg::matmul33(m, &linalg::transpose33(m), &mut m_mt);
    for (i, row) in m_mt.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            if (val - expected).abs() > tolerance {
                return false;
            }
        }
    }
    (determinant33(m) - 1.0).abs() <= tolerance
}

fn determinant33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}
