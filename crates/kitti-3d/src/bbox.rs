//! Oriented 3D bounding boxes in the rectified camera frame.
//!
//! Corner order, with `0..4` on the ground plane (y = 0) and `4..8` on top
//! (y = -h, the camera y axis points down):
//!
//! ```text
//!     5 -------- 4
//!    /|         /|
//!   6 -------- 7 .
//!   | |        | |
//!   . 1 -------- 0
//!   |/         |/
//!   2 -------- 3
//! ```
//!
//! In the object frame corners `0, 1, 4, 5` are at `x = +l/2` (front) and
//! `0, 3, 4, 7` are at `z = +w/2`.

use serde::{Deserialize, Serialize};

use crate::{calibration::KittiCalibration, linalg, transforms};

/// Corner index pairs of the 12 box edges: ground face, top face, then verticals.
pub const BOX3D_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Error types for box construction.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BoxError {
    /// Width, height and length must be finite and strictly positive.
    #[error("Box dimensions must be strictly positive, got {0:?}")]
    NonPositiveSize([f64; 3]),
}

/// Compute the 8 corners of an oriented box in the rectified camera frame.
///
/// The box spans `[-l/2, l/2]` along x, `[-h, 0]` along y and `[-w/2, w/2]`
/// along z in the object frame, so `center` is the bottom center of the object.
/// The corners are rotated by `ry` about the vertical axis and then translated
/// by `center`. The dimensions are not validated.
///
/// # Arguments
///
/// * `size` - The box size as `[width, height, length]`.
/// * `center` - The bottom center of the box.
/// * `ry` - The yaw in radians.
///
/// # Returns
///
/// The corners in the order documented at the module level.
///
/// Example:
///
/// ```
/// use kitti_3d::bbox::box3d_corners;
///
/// let corners = box3d_corners(&[2.0, 1.5, 4.0], &[0.0, 0.0, 0.0], 0.0);
/// assert_eq!(corners[0], [2.0, 0.0, 1.0]);
/// assert_eq!(corners[6], [-2.0, -1.5, -1.0]);
/// ```
pub fn box3d_corners(size: &[f64; 3], center: &[f64; 3], ry: f64) -> [[f64; 3]; 8] {
    let [w, h, l] = *size;
    let x_corners = [l / 2.0, l / 2.0, -l / 2.0, -l / 2.0];
    let z_corners = [w / 2.0, -w / 2.0, -w / 2.0, w / 2.0];

    let rotation = transforms::ry_to_rotation_matrix(ry);

    let mut corners = [[0.0; 3]; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let y = if i < 4 { 0.0 } else { -h };
        let rotated = linalg::mat33_mul_vec3(&rotation, &[x_corners[i % 4], y, z_corners[i % 4]]);
        *corner = [
            rotated[0] + center[0],
            rotated[1] + center[1],
            rotated[2] + center[2],
        ];
    }
    corners
}

/// An oriented 3D box in the rectified camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox3d {
    /// Extent along the object z axis.
    pub width: f64,
    /// Extent along the vertical axis.
    pub height: f64,
    /// Extent along the object x axis, the heading direction.
    pub length: f64,
    /// Bottom center of the box.
    pub center: [f64; 3],
    /// Yaw about the vertical axis in radians.
    pub ry: f64,
}

impl OrientedBox3d {
    /// Create a new box.
    ///
    /// # Arguments
    ///
    /// * `size` - The box size as `[width, height, length]`.
    /// * `center` - The bottom center of the box.
    /// * `ry` - The yaw in radians. Any finite angle is accepted.
    ///
    /// # Errors
    ///
    /// [`BoxError::NonPositiveSize`] if a dimension is not strictly positive.
    pub fn new(size: [f64; 3], center: [f64; 3], ry: f64) -> Result<Self, BoxError> {
        // NaN fails the comparison too
        if !size.iter().all(|&s| s > 0.0 && s.is_finite()) {
            return Err(BoxError::NonPositiveSize(size));
        }
        let [width, height, length] = size;
        Ok(Self {
            width,
            height,
            length,
            center,
            ry,
        })
    }

    /// The box size as `[width, height, length]`.
    pub fn size(&self) -> [f64; 3] {
        [self.width, self.height, self.length]
    }

    /// The 8 corners in the rectified camera frame.
    pub fn corners(&self) -> [[f64; 3]; 8] {
        box3d_corners(&self.size(), &self.center, self.ry)
    }

    /// The 8 corners in the velodyne frame.
    pub fn corners_in_velo(&self, calib: &KittiCalibration) -> Vec<[f64; 3]> {
        calib.project_rect_to_velo(&self.corners())
    }

    /// The 8 corners projected to image coordinates.
    ///
    /// Returns `None` when any corner has a non-positive projected depth,
    /// since the projected pixels would be meaningless.
    pub fn corners_in_image(&self, calib: &KittiCalibration) -> Option<Vec<[f64; 2]>> {
        let (pixels, depths) = calib.project_rect_to_img_with_depth(&self.corners());
        if depths.iter().any(|&w| w <= 0.0) {
            return None;
        }
        Some(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_corners_eq(a: &[[f64; 3]], b: &[[f64; 3]]) {
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(b.iter()) {
            for k in 0..3 {
                assert_relative_eq!(pa[k], pb[k], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_corners_winding_zero_yaw() {
        let (w, h, l) = (1.6, 1.5, 3.9);
        let corners = box3d_corners(&[w, h, l], &[0.0, 0.0, 0.0], 0.0);
        let expected = [
            [l / 2.0, 0.0, w / 2.0],
            [l / 2.0, 0.0, -w / 2.0],
            [-l / 2.0, 0.0, -w / 2.0],
            [-l / 2.0, 0.0, w / 2.0],
            [l / 2.0, -h, w / 2.0],
            [l / 2.0, -h, -w / 2.0],
            [-l / 2.0, -h, -w / 2.0],
            [-l / 2.0, -h, w / 2.0],
        ];
        assert_corners_eq(&corners, &expected);
    }

    #[test]
    fn test_corners_quarter_turn() {
        let unrotated = box3d_corners(&[2.0, 2.0, 2.0], &[0.0, 0.0, 0.0], 0.0);
        let rotated = box3d_corners(
            &[2.0, 2.0, 2.0],
            &[0.0, 0.0, 0.0],
            std::f64::consts::FRAC_PI_2,
        );
        // (x', y, z') = (z, y, -x)
        for (r, u) in rotated.iter().zip(unrotated.iter()) {
            assert_relative_eq!(r[0], u[2], epsilon = 1e-12);
            assert_relative_eq!(r[1], u[1], epsilon = 1e-12);
            assert_relative_eq!(r[2], -u[0], epsilon = 1e-12);
        }
        assert_relative_eq!(rotated[0][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(rotated[0][2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_corners_translated() {
        let center = [1.84, 1.47, 8.41];
        let at_origin = box3d_corners(&[1.67, 1.87, 3.69], &[0.0; 3], -1.56);
        let moved = box3d_corners(&[1.67, 1.87, 3.69], &center, -1.56);
        for (m, o) in moved.iter().zip(at_origin.iter()) {
            for k in 0..3 {
                assert_relative_eq!(m[k], o[k] + center[k], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_edges_connect_adjacent_corners() {
        let corners = box3d_corners(&[2.0, 3.0, 5.0], &[0.0; 3], 0.7);
        for (i, j) in BOX3D_EDGES {
            let d = (0..3)
                .map(|k| (corners[i][k] - corners[j][k]).powi(2))
                .sum::<f64>()
                .sqrt();
            // every edge has length w, h or l
            assert!(
                [2.0, 3.0, 5.0].iter().any(|e| (d - e).abs() < 1e-9),
                "edge ({}, {}) has length {}",
                i,
                j,
                d
            );
        }
    }

    #[test]
    fn test_oriented_box_new() {
        assert!(OrientedBox3d::new([1.0, 1.0, 1.0], [0.0; 3], 0.0).is_ok());
        assert_eq!(
            OrientedBox3d::new([0.0, 1.0, 1.0], [0.0; 3], 0.0),
            Err(BoxError::NonPositiveSize([0.0, 1.0, 1.0]))
        );
        assert!(OrientedBox3d::new([1.0, -2.0, 1.0], [0.0; 3], 0.0).is_err());
        assert!(OrientedBox3d::new([1.0, 2.0, f64::NAN], [0.0; 3], 0.0).is_err());
    }

    #[test]
    fn test_corners_in_image_and_velo() -> Result<(), BoxError> {
        let calib = KittiCalibration::new(
            [
                [721.54, 0.0, 609.56, -45.38],
                [0.0, 721.54, 172.85, 0.12],
                [0.0, 0.0, 1.0, 0.0],
            ],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            [
                [0.0, -1.0, 0.0, 0.0],
                [0.0, 0.0, -1.0, 0.0],
                [1.0, 0.0, 0.0, 0.0],
            ],
        );

        let in_front = OrientedBox3d::new([1.6, 1.5, 3.9], [1.0, 1.7, 12.0], 0.3)?;
        let pixels = in_front.corners_in_image(&calib).map(|p| p.len());
        assert_eq!(pixels, Some(8));

        let behind = OrientedBox3d::new([1.6, 1.5, 3.9], [1.0, 1.7, -12.0], 0.3)?;
        assert!(behind.corners_in_image(&calib).is_none());

        // camera z forward is velodyne x forward
        let velo = in_front.corners_in_velo(&calib);
        for (v, c) in velo.iter().zip(in_front.corners().iter()) {
            assert_relative_eq!(v[0], c[2], epsilon = 1e-12);
            assert_relative_eq!(v[1], -c[0], epsilon = 1e-12);
            assert_relative_eq!(v[2], -c[1], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_corners_in_image_uses_projected_depth() -> Result<(), BoxError> {
        let calib_with_offset = |t3: f64| {
            KittiCalibration::new(
                [
                    [721.54, 0.0, 609.56, 0.0],
                    [0.0, 721.54, 172.85, 0.0],
                    [0.0, 0.0, 1.0, t3],
                ],
                [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                [
                    [0.0, -1.0, 0.0, 0.0],
                    [0.0, 0.0, -1.0, 0.0],
                    [1.0, 0.0, 0.0, 0.0],
                ],
            )
        };

        // every corner has a positive rectified z but a negative projected depth
        let in_front = OrientedBox3d::new([1.6, 1.5, 3.9], [1.0, 1.7, 12.0], 0.3)?;
        assert!(in_front.corners().iter().all(|c| c[2] > 0.0));
        assert!(in_front.corners_in_image(&calib_with_offset(-100.0)).is_none());

        // and the other way round
        let behind = OrientedBox3d::new([1.6, 1.5, 3.9], [1.0, 1.7, -12.0], 0.3)?;
        assert!(behind.corners().iter().all(|c| c[2] < 0.0));
        let pixels = behind.corners_in_image(&calib_with_offset(20.0));
        assert_eq!(pixels.map(|p| p.len()), Some(8));
        Ok(())
    }
}
