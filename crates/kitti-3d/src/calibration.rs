//! Per-scene calibration and the frame chain built from it.
//!
//! ```text
//! x_ref  = Tr_velo_to_cam * x_velo
//! x_rect = R0_rect * x_ref
//! y_img  = P2 * x_rect
//! ```
//!
//! Velodyne frame: x forward, y left, z up.
//! Reference and rectified camera frames: x right, y down, z forward.
//! Image frame: u to the right, v down, in pixels.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use serde::Serialize;

use crate::{linalg, transforms};

/// Key of the rectified camera to image projection (left color camera).
pub const KEY_P2: &str = "P2";
/// Key of the reference to rectified camera rotation.
pub const KEY_R0_RECT: &str = "R0_rect";
/// Key of the velodyne to reference camera rigid transform.
pub const KEY_TR_VELO_TO_CAM: &str = "Tr_velo_to_cam";

// tolerance used only to warn about implausible rigid transforms
const ROTATION_TOLERANCE: f64 = 1e-3;

/// Error types for the calibration module.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// Error reading the calibration file
    #[error("error reading calibration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed line or numeric literal
    #[error("Parse error {0}")]
    ParseError(String),

    /// A required key is absent
    #[error("Missing calibration key: {0}")]
    MissingKey(String),

    /// A required key does not reshape into its matrix
    #[error("Invalid number of elements for {key}: expected {expected}, got {got}")]
    InvalidNumElements {
        /// The offending key.
        key: String,
        /// Element count of the declared matrix shape.
        expected: usize,
        /// Element count found in the file.
        got: usize,
    },
}

/// The raw key/value content of a calibration file.
///
/// Every entry is kept, including the ones the frame chain does not use
/// (`P0`, `P1`, `P3`, `Tr_imu_to_velo`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationRecord {
    entries: BTreeMap<String, Vec<f64>>,
}

impl CalibrationRecord {
    /// Parse the `key: v0 v1 ... vN` lines of a calibration file.
    ///
    /// Blank lines are skipped. A later duplicate key replaces an earlier one.
    pub fn parse_lines<I, S>(lines: I) -> Result<Self, CalibrationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            let (key, values) = parse_line(line)?;
            entries.insert(key, values);
        }
        Ok(Self { entries })
    }

    /// Get the values stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Iterate over the keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reshape the values under `key` into a row-major `R x C` matrix.
    ///
    /// The element count must be exactly `R * C`; nothing is truncated or padded.
    pub fn matrix<const R: usize, const C: usize>(
        &self,
        key: &str,
    ) -> Result<[[f64; C]; R], CalibrationError> {
        let values = self
            .get(key)
            .ok_or_else(|| CalibrationError::MissingKey(key.to_string()))?;

        if values.len() != R * C {
            return Err(CalibrationError::InvalidNumElements {
                key: key.to_string(),
                expected: R * C,
                got: values.len(),
            });
        }

        let mut m = [[0.0; C]; R];
        for (row, chunk) in m.iter_mut().zip(values.chunks_exact(C)) {
            row.copy_from_slice(chunk);
        }
        Ok(m)
    }

    fn insert_matrix<const R: usize, const C: usize>(&mut self, key: &str, m: &[[f64; C]; R]) {
        self.entries.insert(key.to_string(), m.as_flattened().to_vec());
    }
}

/// Utility function to parse a numeric literal.
fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, CalibrationError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| CalibrationError::ParseError(format!("{}: {}", s, e)))
}

/// Parse a `key: v0 v1 ... vN` line.
/// NOTE: `:` must appear exactly once.
fn parse_line(line: &str) -> Result<(String, Vec<f64>), CalibrationError> {
    let parts = line.split(':').collect::<Vec<_>>();

    let [key, values] = parts.as_slice() else {
        return Err(CalibrationError::ParseError(format!(
            "Expected a single ':' delimiter, got {} parts in line: {}",
            parts.len(),
            line
        )));
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(CalibrationError::ParseError(format!(
            "Empty key in line: {}",
            line
        )));
    }

    let values = values
        .split_whitespace()
        .map(parse_part::<f64>)
        .collect::<Result<Vec<f64>, _>>()?;

    Ok((key.to_string(), values))
}

/// The calibration of one scene.
///
/// Holds the three matrices of the frame chain plus the inverse rigid
/// transform, computed once at construction. Immutable after construction and
/// safe to share across threads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KittiCalibration {
    // rectified camera -> image, 3x4
    p_rect_to_img: [[f64; 4]; 3],
    // reference camera -> rectified camera, 3x3
    r_ref_to_rect: [[f64; 3]; 3],
    // velodyne -> reference camera, 3x4
    p_velo_to_ref: [[f64; 4]; 3],
    // reference camera -> velodyne, 3x4
    p_ref_to_velo: [[f64; 4]; 3],
    record: CalibrationRecord,
}

impl KittiCalibration {
    /// Create a calibration from its three matrices.
    ///
    /// # Arguments
    ///
    /// * `p_rect_to_img` - The `P2` projection matrix.
    /// * `r_ref_to_rect` - The `R0_rect` rotation.
    /// * `p_velo_to_ref` - The `Tr_velo_to_cam` rigid transform.
    pub fn new(
        p_rect_to_img: [[f64; 4]; 3],
        r_ref_to_rect: [[f64; 3]; 3],
        p_velo_to_ref: [[f64; 4]; 3],
    ) -> Self {
        let mut record = CalibrationRecord::default();
        record.insert_matrix(KEY_P2, &p_rect_to_img);
        record.insert_matrix(KEY_R0_RECT, &r_ref_to_rect);
        record.insert_matrix(KEY_TR_VELO_TO_CAM, &p_velo_to_ref);
        Self::with_record(p_rect_to_img, r_ref_to_rect, p_velo_to_ref, record)
    }

    /// Build the calibration from a parsed record.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::MissingKey`] or [`CalibrationError::InvalidNumElements`]
    /// if `P2`, `R0_rect` or `Tr_velo_to_cam` is absent or has the wrong size.
    pub fn from_record(record: CalibrationRecord) -> Result<Self, CalibrationError> {
        let p_rect_to_img = record.matrix::<3, 4>(KEY_P2)?;
        let r_ref_to_rect = record.matrix::<3, 3>(KEY_R0_RECT)?;
        let p_velo_to_ref = record.matrix::<3, 4>(KEY_TR_VELO_TO_CAM)?;
        Ok(Self::with_record(
            p_rect_to_img,
            r_ref_to_rect,
            p_velo_to_ref,
            record,
        ))
    }

    /// Read a calibration file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the `<scene>.txt` calibration file.
    ///
    /// # Returns
    ///
    /// The calibration, or an error if any line is malformed or a required
    /// matrix is missing. Nothing is returned on failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        let record = CalibrationRecord::parse_lines(lines)?;

        log::debug!(
            "loaded calibration {} with {} keys",
            path.display(),
            record.len()
        );

        Self::from_record(record)
    }

    fn with_record(
        p_rect_to_img: [[f64; 4]; 3],
        r_ref_to_rect: [[f64; 3]; 3],
        p_velo_to_ref: [[f64; 4]; 3],
        record: CalibrationRecord,
    ) -> Self {
        let (r_velo_to_ref, _) = linalg::split_affine(&p_velo_to_ref);
        if !transforms::is_rotation_matrix(&r_velo_to_ref, ROTATION_TOLERANCE) {
            log::warn!(
                "{} rotation block is not orthonormal, its rigid inverse is approximate",
                KEY_TR_VELO_TO_CAM
            );
        }

        Self {
            p_rect_to_img,
            r_ref_to_rect,
            p_velo_to_ref,
            p_ref_to_velo: linalg::rigid_inverse(&p_velo_to_ref),
            record,
        }
    }

    /// The rectified camera to image projection matrix (`P2`).
    pub fn p_rect_to_img(&self) -> &[[f64; 4]; 3] {
        &self.p_rect_to_img
    }

    /// The reference to rectified camera rotation (`R0_rect`).
    pub fn r_ref_to_rect(&self) -> &[[f64; 3]; 3] {
        &self.r_ref_to_rect
    }

    /// The velodyne to reference camera rigid transform (`Tr_velo_to_cam`).
    pub fn p_velo_to_ref(&self) -> &[[f64; 4]; 3] {
        &self.p_velo_to_ref
    }

    /// The reference camera to velodyne rigid transform.
    pub fn p_ref_to_velo(&self) -> &[[f64; 4]; 3] {
        &self.p_ref_to_velo
    }

    /// The raw record the calibration was built from.
    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    /// Project points from the velodyne frame to the reference camera frame.
    pub fn project_velo_to_ref(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        linalg::affine_points3d_vec(points, &self.p_velo_to_ref)
    }

    /// Project points from the reference camera frame to the velodyne frame.
    pub fn project_ref_to_velo(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        linalg::affine_points3d_vec(points, &self.p_ref_to_velo)
    }

    /// Project points from the reference camera frame to the rectified camera frame.
    ///
    /// In row form `y = x * Rᵗ`.
    pub fn project_ref_to_rect(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        linalg::transform_points3d_vec(points, &self.r_ref_to_rect, &[0.0; 3])
    }

    /// Project points from the rectified camera frame to the reference camera frame.
    ///
    /// Inverse of [`Self::project_ref_to_rect`]: in row form `x = y * R`.
    pub fn project_rect_to_ref(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        let r_rect_to_ref = linalg::transpose33(&self.r_ref_to_rect);
        linalg::transform_points3d_vec(points, &r_rect_to_ref, &[0.0; 3])
    }

    /// Project points from the rectified camera frame to image coordinates.
    ///
    /// The perspective division is not guarded: a point with zero projected
    /// depth gives non-finite pixels and a point behind the camera gives a
    /// mirrored pixel. Callers must keep only points with strictly positive
    /// projected depth, the third component of `P2 * [x, y, z, 1]`, before
    /// using the output. See [`Self::project_rect_to_img_with_depth`] and
    /// [`crate::fov::FovFilter`].
    pub fn project_rect_to_img(&self, points: &[[f64; 3]]) -> Vec<[f64; 2]> {
        linalg::project_points3d_vec(points, &self.p_rect_to_img)
    }

    /// Project points from the rectified camera frame to image coordinates,
    /// also returning the projected depth of every point.
    ///
    /// The depth is the third component of `P2 * [x, y, z, 1]`, the value the
    /// pixel was divided by. It differs from the rectified `z` by the
    /// translation in the last row of `P2`. A pixel is only meaningful when
    /// its depth is strictly positive.
    pub fn project_rect_to_img_with_depth(
        &self,
        points: &[[f64; 3]],
    ) -> (Vec<[f64; 2]>, Vec<f64>) {
        linalg::project_points3d_with_depth_vec(points, &self.p_rect_to_img)
    }

    /// Project points from the velodyne frame to the rectified camera frame.
    pub fn project_velo_to_rect(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        self.project_ref_to_rect(&self.project_velo_to_ref(points))
    }

    /// Project points from the rectified camera frame to the velodyne frame.
    pub fn project_rect_to_velo(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        self.project_ref_to_velo(&self.project_rect_to_ref(points))
    }

    /// Project points from the velodyne frame to image coordinates.
    ///
    /// Same depth caveat as [`Self::project_rect_to_img`].
    pub fn project_velo_to_img(&self, points: &[[f64; 3]]) -> Vec<[f64; 2]> {
        self.project_rect_to_img(&self.project_velo_to_rect(points))
    }
}

impl FromStr for KittiCalibration {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_record(CalibrationRecord::parse_lines(s.lines())?)
    }
}
