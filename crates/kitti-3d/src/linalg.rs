/// Error types for the batched point kernels.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinalgError {
    /// The source and destination buffers hold a different number of points.
    #[error("Shape mismatch: {0} source points but {1} destination points")]
    ShapeMismatch(usize, usize),
}

/// Split a 3x4 affine matrix `[R | t]` into its 3x3 block and its last column.
pub fn split_affine(m: &[[f64; 4]; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let mut r = [[0.0; 3]; 3];
    let mut t = [0.0; 3];
    for (i, row) in m.iter().enumerate() {
        r[i].copy_from_slice(&row[..3]);
        t[i] = row[3];
    }
    (r, t)
}

/// Stack a 3x3 block and a translation into a 3x4 affine matrix `[R | t]`.
pub fn compose_affine(r: &[[f64; 3]; 3], t: &[f64; 3]) -> [[f64; 4]; 3] {
    let mut m = [[0.0; 4]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        row[..3].copy_from_slice(&r[i]);
        row[3] = t[i];
    }
    m
}

/// Transpose of a 3x3 matrix.
pub fn transpose33(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Multiply a 3x3 matrix by a 3-vector.
pub fn mat33_mul_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Multiply two 3x3 matrices, `m = a * b`.
pub fn matmul33(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3], m: &mut [[f64; 3]; 3]) {
    for (i, row) in m.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
}

/// Invert a rigid transform `[R | t]`.
///
/// The inverse is `[Rᵗ | -Rᵗt]`.
///
/// PRECONDITION: the 3x3 block of `m` is orthonormal.
///
/// Example:
///
/// ```
/// use kitti_3d::linalg::rigid_inverse;
///
/// let m = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 2.0], [0.0, 0.0, 1.0, 3.0]];
/// let inv = rigid_inverse(&m);
/// assert_eq!(inv[0][3], -1.0);
/// ```
pub fn rigid_inverse(m: &[[f64; 4]; 3]) -> [[f64; 4]; 3] {
    let (r, t) = split_affine(m);
    let r_inv = transpose33(&r);
    let t_inv = mat33_mul_vec3(&r_inv, &t).map(|v| -v);
    compose_affine(&r_inv, &t_inv)
}

// Computes dst_i = R * src_i + t for every point. Lengths must match.
fn transform_points3d_impl(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) {
    debug_assert_eq!(src_points.len(), dst_points.len());
    let num_points = src_points.len();

    let dst_r_src_mat = faer::mat::from_row_major_slice::<f64, _, _>(dst_r_src.as_flattened(), 3, 3);

    // Nx3 row-major view where each row is a point
    let points_in_src =
        faer::mat::from_row_major_slice::<f64, _, _>(src_points.as_flattened(), num_points, 3);

    // 3xN column-major view where each column is a point
    let mut points_in_dst =
        faer::mat::from_column_major_slice_mut::<f64, _, _>(dst_points.as_flattened_mut(), 3, num_points);

    faer::linalg::matmul::matmul(
        &mut points_in_dst,
        dst_r_src_mat,
        points_in_src.transpose(),
        None,
        1.0,
        faer::Parallelism::None,
    );

    for mut col in points_in_dst.col_iter_mut() {
        for (i, t) in dst_t_src.iter().enumerate() {
            col.write(i, col.read(i) + t);
        }
    }
}

/// Transform a set of points using a rotation and translation.
///
/// Computes `dst_i = R * src_i + t`, which in row form is the homogenized point
/// multiplied by the transpose of `[R | t]`. The i-th output always corresponds
/// to the i-th input.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - The 3x3 linear part. Need not be a rotation.
/// * `dst_t_src` - The translation vector.
/// * `dst_points` - A pre-allocated buffer to store the transformed points.
///
/// # Errors
///
/// [`LinalgError::ShapeMismatch`] if the buffers have different lengths.
///
/// Example:
///
/// ```
/// use kitti_3d::linalg::transform_points3d;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points3d(&src_points, &rotation, &translation, &mut dst_points).unwrap();
/// ```
pub fn transform_points3d(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) -> Result<(), LinalgError> {
    if src_points.len() != dst_points.len() {
        return Err(LinalgError::ShapeMismatch(
            src_points.len(),
            dst_points.len(),
        ));
    }
    transform_points3d_impl(src_points, dst_r_src, dst_t_src, dst_points);
    Ok(())
}

/// Apply a 3x4 affine matrix to a set of points.
///
/// Equivalent to homogenizing every point and right-multiplying by `mᵗ`.
pub fn affine_points3d(
    src_points: &[[f64; 3]],
    m: &[[f64; 4]; 3],
    dst_points: &mut [[f64; 3]],
) -> Result<(), LinalgError> {
    let (r, t) = split_affine(m);
    transform_points3d(src_points, &r, &t, dst_points)
}

/// Project a set of points through a 3x4 projection matrix.
///
/// Each point is homogenized, multiplied by `p` giving `(u·z, v·z, z)`, and the
/// first two components are divided by the third.
///
/// The division is not guarded. A point whose projected depth is zero yields
/// non-finite coordinates and a point with negative depth yields a mirrored
/// pixel. Callers must keep only points with strictly positive depth before
/// reading the output as image coordinates.
///
/// # Errors
///
/// [`LinalgError::ShapeMismatch`] if the buffers have different lengths.
///
/// Example:
///
/// ```
/// use kitti_3d::linalg::project_points3d;
///
/// let p = [[100.0, 0.0, 50.0, 0.0], [0.0, 100.0, 40.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
/// let mut uv = vec![[0.0; 2]; 1];
/// project_points3d(&[[0.0, 0.0, 2.0]], &p, &mut uv).unwrap();
/// assert_eq!(uv[0], [50.0, 40.0]);
/// ```
pub fn project_points3d(
    src_points: &[[f64; 3]],
    p: &[[f64; 4]; 3],
    dst_points: &mut [[f64; 2]],
) -> Result<(), LinalgError> {
    if src_points.len() != dst_points.len() {
        return Err(LinalgError::ShapeMismatch(
            src_points.len(),
            dst_points.len(),
        ));
    }
    let projected = affine_points3d_vec(src_points, p);
    perspective_divide(&projected, dst_points);
    Ok(())
}

fn perspective_divide(projected: &[[f64; 3]], dst_points: &mut [[f64; 2]]) {
    for (dst, [x, y, z]) in dst_points.iter_mut().zip(projected) {
        *dst = [x / z, y / z];
    }
}

pub(crate) fn transform_points3d_vec(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
) -> Vec<[f64; 3]> {
    let mut dst_points = vec![[0.0; 3]; src_points.len()];
    transform_points3d_impl(src_points, dst_r_src, dst_t_src, &mut dst_points);
    dst_points
}

pub(crate) fn affine_points3d_vec(src_points: &[[f64; 3]], m: &[[f64; 4]; 3]) -> Vec<[f64; 3]> {
    let (r, t) = split_affine(m);
    transform_points3d_vec(src_points, &r, &t)
}

pub(crate) fn project_points3d_vec(src_points: &[[f64; 3]], p: &[[f64; 4]; 3]) -> Vec<[f64; 2]> {
    let projected = affine_points3d_vec(src_points, p);
    let mut dst_points = vec![[0.0; 2]; src_points.len()];
    perspective_divide(&projected, &mut dst_points);
    dst_points
}

/// Like [`project_points3d_vec`], also returning the projected depth `p[2]·[x, y, z, 1]`
/// of every point, which is the divisor of its pixel.
pub(crate) fn project_points3d_with_depth_vec(
    src_points: &[[f64; 3]],
    p: &[[f64; 4]; 3],
) -> (Vec<[f64; 2]>, Vec<f64>) {
    let projected = affine_points3d_vec(src_points, p);
    let mut dst_points = vec![[0.0; 2]; src_points.len()];
    perspective_divide(&projected, &mut dst_points);
    let depths = projected.iter().map(|q| q[2]).collect();
    (dst_points, depths)
}
