//! Image-side pieces of arcalib.
//!
//! - [`ChessboardDetector`]: ChESS X-junctions (`chess-corners`) linked into
//!   the full chessboard grid by the `calib-targets` grid detector.
//! - [`CharucoBoardDetector`]: ArUco markers in the white squares identify
//!   each corner, so partial views still count. [`SidecarDetector`] reads
//!   corners written by an external decoder instead.
//! - [`ZhangCalibrator`]: closed-form intrinsics from planar homographies
//!   refined with a radial distortion fit; plugs into
//!   [`arcalib_session::Calibrator`].
//! - Planar pose estimation and the virtual pyramid / axis overlays.
//! - Harris corner marking for the standalone corner viewer.
//! - Chessboard, ChArUco board and single marker rendering for printing,
//!   plus synthetic views for tests.

mod charuco;
mod chessboard;
mod detector;
mod draw;
mod frame;
mod harris;
mod marker;
mod pose;
mod render;
mod sidecar;
pub mod synthetic;
mod xjunction;
mod zhang;

pub use charuco::{CharucoBoardDetector, CharucoParams};
pub use chessboard::{ChessboardDetector, ChessboardParams};
pub use detector::{DetectError, TargetDetector};
pub use draw::{draw_axes, draw_corners, draw_detection, draw_segments, BLUE, GREEN, RED, YELLOW};
pub use frame::Frame;
pub use harris::{harris_corners, harris_response, normalize_response, HarrisParams, ResponseImage};
pub use marker::{dictionary, MarkerError, MarkerRender, DEFAULT_DICTIONARY};
pub use pose::{
    axis_segments, estimate_planar_pose, pose_from_homography, project_segments,
    pyramid_segments, Segment,
};
pub use render::BoardRender;
pub use sidecar::{sidecar_path, MarkerSidecar, SidecarCorner, SidecarDetector};
pub use xjunction::ChessSettings;
pub use zhang::{ZhangCalibrator, ZhangOptions};
