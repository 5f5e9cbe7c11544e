use serde::{Deserialize, Serialize};

use crate::calibration::KittiCalibration;

/// Keeps the velodyne points that fall inside the image of the left color camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FovFilter {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Minimum forward distance in the velodyne frame, in meters.
    pub clip_distance: f64,
}

impl Default for FovFilter {
    fn default() -> Self {
        Self {
            image_width: 1242,
            image_height: 375,
            clip_distance: 2.0,
        }
    }
}

/// The points kept by a [`FovFilter`], in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FovPoints {
    /// Index of every kept point in the input batch.
    pub indices: Vec<usize>,
    /// Kept points in the rectified camera frame.
    pub points_rect: Vec<[f64; 3]>,
    /// Kept points in image coordinates.
    pub points_img: Vec<[f64; 2]>,
}

impl FovPoints {
    /// Number of kept points.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether no point was kept.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl FovFilter {
    /// Create a filter for an image of the given size with the default clip distance.
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_width,
            image_height,
            ..Default::default()
        }
    }

    /// Set the minimum forward distance.
    pub fn with_clip_distance(mut self, clip_distance: f64) -> Self {
        self.clip_distance = clip_distance;
        self
    }

    /// Select the velodyne points that project inside the image.
    ///
    /// A point is kept when its projected depth (the third component of
    /// `P2 * [x, y, z, 1]`) is strictly positive, its
    /// forward distance exceeds `clip_distance` and its pixel lies in
    /// `[0, width) x [0, height)`.
    ///
    /// # Arguments
    ///
    /// * `calib` - The calibration of the scene.
    /// * `points_velo` - The points in the velodyne frame.
    pub fn apply(&self, calib: &KittiCalibration, points_velo: &[[f64; 3]]) -> FovPoints {
        let points_rect = calib.project_velo_to_rect(points_velo);
        let (points_img, depths) = calib.project_rect_to_img_with_depth(&points_rect);

        let (width, height) = (self.image_width as f64, self.image_height as f64);

        let mut kept = FovPoints::default();
        for (i, (((velo, rect), img), depth)) in points_velo
            .iter()
            .zip(points_rect.iter())
            .zip(points_img.iter())
            .zip(depths.iter())
            .enumerate()
        {
            // depth first: the pixel is meaningless otherwise
            if *depth <= 0.0 || velo[0] <= self.clip_distance {
                continue;
            }
            let [u, v] = *img;
            if u >= 0.0 && u < width && v >= 0.0 && v < height {
                kept.indices.push(i);
                kept.points_rect.push(*rect);
                kept.points_img.push(*img);
            }
        }

        log::debug!(
            "kept {} of {} points in the camera field of view",
            kept.len(),
            points_velo.len()
        );

        kept
    }
}
