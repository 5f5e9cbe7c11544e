#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Oriented 3D bounding box geometry.
pub mod bbox;

/// Calibration files and the sensor, camera and image frame chain.
pub mod calibration;

/// Camera field of view filtering of velodyne points.
pub mod fov;

/// Batched point kernels and small fixed-size matrix helpers.
pub mod linalg;

/// Annotated objects and the category list.
pub mod object;

/// Point batches and their flat buffer boundary.
pub mod pointcloud;

/// Rotation builders.
pub mod transforms;
