use serde::{Deserialize, Serialize};

use crate::bbox::{BoxError, OrientedBox3d};

/// Object categories of the KITTI object benchmark. `DontCare` is always last.
pub const KITTI_CLASSES: [&str; 9] = [
    "Car",
    "Van",
    "Truck",
    "Pedestrian",
    "Person_sitting",
    "Cyclist",
    "Tram",
    "Misc",
    "DontCare",
];

/// One annotated object of a scene, as decoded from a label file.
///
/// Dimensions are in meters, the location is the bottom center of the object
/// in the rectified camera frame and `ry` is the yaw about the camera y axis
/// in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KittiObject {
    /// Category name, one of [`KITTI_CLASSES`].
    pub class: String,
    /// 2D box in image coordinates: left, top, right, bottom.
    pub bbox2d: [f64; 4],
    /// Height of the object.
    pub height: f64,
    /// Width of the object.
    pub width: f64,
    /// Length of the object.
    pub length: f64,
    /// Bottom center in the rectified camera frame.
    pub location: [f64; 3],
    /// Yaw about the camera y axis in radians.
    pub ry: f64,
}

impl KittiObject {
    /// Index of the category in [`KITTI_CLASSES`], if known.
    pub fn class_id(&self) -> Option<usize> {
        KITTI_CLASSES.iter().position(|c| *c == self.class)
    }

    /// Whether the object is a `DontCare` region, which carries no 3D box.
    pub fn is_dont_care(&self) -> bool {
        self.class == "DontCare"
    }

    /// The oriented 3D box of the object.
    pub fn box3d(&self) -> Result<OrientedBox3d, BoxError> {
        OrientedBox3d::new([self.width, self.height, self.length], self.location, self.ry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pedestrian() -> KittiObject {
        // first object of label_2/000000.txt
        KittiObject {
            class: "Pedestrian".to_string(),
            bbox2d: [712.40, 143.00, 810.73, 307.92],
            height: 1.89,
            width: 0.48,
            length: 1.20,
            location: [1.84, 1.47, 8.41],
            ry: 0.01,
        }
    }

    #[test]
    fn test_class_id() {
        assert_eq!(pedestrian().class_id(), Some(3));
        let mut unknown = pedestrian();
        unknown.class = "Bus".to_string();
        assert_eq!(unknown.class_id(), None);
        assert_eq!(KITTI_CLASSES[KITTI_CLASSES.len() - 1], "DontCare");
    }

    #[test]
    fn test_box3d_maps_dimensions() -> Result<(), BoxError> {
        let obj = pedestrian();
        let b = obj.box3d()?;
        assert_eq!(b.size(), [0.48, 1.89, 1.20]);
        assert_eq!(b.center, [1.84, 1.47, 8.41]);
        assert_eq!(b.ry, 0.01);
        assert!(!obj.is_dont_care());
        Ok(())
    }

    #[test]
    fn test_dont_care_has_no_box() {
        // DontCare regions are labeled with -1 dimensions
        let obj = KittiObject {
            class: "DontCare".to_string(),
            bbox2d: [800.38, 163.67, 825.45, 184.07],
            height: -1.0,
            width: -1.0,
            length: -1.0,
            location: [-1000.0, -1000.0, -1000.0],
            ry: -10.0,
        };
        assert!(obj.is_dont_care());
        assert!(obj.box3d().is_err());
    }
}
