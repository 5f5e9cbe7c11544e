/// Error types for point batches.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShapeError {
    /// Points must have 3 (x, y, z) or 4 (x, y, z, w or reflectance) components.
    #[error("Invalid point width {0}, expected 3 or 4")]
    InvalidWidth(usize),

    /// The flat buffer does not split into whole points.
    #[error("Buffer of {len} values is not a multiple of the point width {width}")]
    Remainder {
        /// Number of values in the buffer.
        len: usize,
        /// Requested point width.
        width: usize,
    },
}

/// Number of `f32` values per point in a velodyne scan: x, y, z, reflectance.
pub const VELODYNE_POINT_WIDTH: usize = 4;

/// Build a point batch from a flat row-major buffer.
///
/// Only the first 3 components of each point are kept. The order of the points
/// is preserved.
///
/// # Arguments
///
/// * `data` - The flat buffer, `f32` for raw velodyne scans or `f64`.
/// * `width` - The number of values per point, 3 or 4.
///
/// Example:
///
/// ```
/// use kitti_3d::pointcloud::{points_from_flat, VELODYNE_POINT_WIDTH};
///
/// let scan = [1.0f32, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.1];
/// let points = points_from_flat(&scan, VELODYNE_POINT_WIDTH).unwrap();
/// assert_eq!(points, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
/// ```
pub fn points_from_flat<T>(data: &[T], width: usize) -> Result<Vec<[f64; 3]>, ShapeError>
where
    T: Copy + Into<f64>,
{
    if width != 3 && width != 4 {
        return Err(ShapeError::InvalidWidth(width));
    }
    if data.len() % width != 0 {
        return Err(ShapeError::Remainder {
            len: data.len(),
            width,
        });
    }

    Ok(data
        .chunks_exact(width)
        .map(|p| [p[0].into(), p[1].into(), p[2].into()])
        .collect())
}

/// Append a constant 1 to every point.
pub fn points_to_homogeneous(points: &[[f64; 3]]) -> Vec<[f64; 4]> {
    points.iter().map(|&[x, y, z]| [x, y, z, 1.0]).collect()
}

/// Convert homogeneous points back to Cartesian by dividing by the last component.
///
/// The division is not guarded; points at infinity (`w = 0`) give non-finite values.
pub fn points_from_homogeneous(points: &[[f64; 4]]) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|&[x, y, z, w]| [x / w, y / w, z / w])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_from_flat_velodyne() -> Result<(), ShapeError> {
        let scan = [
            10.5f32, -2.25, -1.5, 0.3, //
            7.0, 0.5, 0.25, 0.0, //
            -3.0, 1.0, 2.0, 1.0,
        ];
        let points = points_from_flat(&scan, VELODYNE_POINT_WIDTH)?;
        assert_eq!(
            points,
            vec![[10.5, -2.25, -1.5], [7.0, 0.5, 0.25], [-3.0, 1.0, 2.0]]
        );
        Ok(())
    }

    #[test]
    fn test_points_from_flat_xyz() -> Result<(), ShapeError> {
        let data = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        let points = points_from_flat(&data, 3)?;
        assert_eq!(points, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert!(points_from_flat::<f64>(&[], 3)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_points_from_flat_errors() {
        let data = [0.0f32; 12];
        assert_eq!(points_from_flat(&data, 2), Err(ShapeError::InvalidWidth(2)));
        assert_eq!(points_from_flat(&data, 5), Err(ShapeError::InvalidWidth(5)));
        assert_eq!(
            points_from_flat(&data[..10], 4),
            Err(ShapeError::Remainder { len: 10, width: 4 })
        );
    }

    #[test]
    fn test_homogeneous() {
        let points = vec![[1.0, 2.0, 3.0], [-4.0, 0.5, 8.0]];
        let homogeneous = points_to_homogeneous(&points);
        assert_eq!(homogeneous[1], [-4.0, 0.5, 8.0, 1.0]);
        assert_eq!(points_from_homogeneous(&homogeneous), points);
        assert_eq!(
            points_from_homogeneous(&[[2.0, 4.0, 6.0, 2.0]]),
            vec![[1.0, 2.0, 3.0]]
        );
    }
}
