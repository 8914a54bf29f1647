//! Core types and utilities shared by the arcalib crates.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any image type, detector or calibration solver. It provides:
//! - the detection and target-layout vocabulary (`Detection`, `TargetLayout`),
//! - a normalized DLT homography estimator,
//! - pinhole + Brown-Conrady camera helpers (projection, undistortion,
//!   Rodrigues vectors),
//! - JSON file helpers and the workspace logger.

mod camera;
mod homography;
mod io;
mod logger;
mod target;

pub use camera::{
    distort_normalized, pose_from_rodrigues, project_point, rodrigues_from_rotation,
    undistort_pixel, CameraIntrinsics, FrameSize, DISTORTION_COEFFS,
};
pub use homography::{estimate_homography, Homography};
pub use io::{read_json, write_json, JsonIoError};
pub use target::{ChessboardSpec, Detection, LayoutError, TargetLayout};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
