//! Camera calibration demo toolkit.
//!
//! This crate re-exports the workspace crates and adds the frame-driven
//! parts:
//! - [`LiveLoop`]: detect a planar target on every frame, take samples on
//!   `s`, calibrate on `c` (in the background by default) and, once
//!   calibrated, draw the target pose with a virtual pyramid,
//! - [`run_corners`]: the Harris corner viewer,
//! - [`FrameSource`] / [`KeySource`] and their file, script and stdin
//!   implementations,
//! - [`LiveConfig`], the JSON configuration shared by the `arcalib` binary.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use arcalib::{
//!     ImageSequenceSource, LiveConfig, LiveLoop, LoopOptions, ScriptedKeys,
//! };
//! use arcalib::session::CalibrationSession;
//! use arcalib::vision::{ChessboardDetector, ZhangCalibrator};
//! use arcalib::core::TargetLayout;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LiveConfig::default();
//! let layout = TargetLayout::from_chessboard(&config.board)?;
//! let session = CalibrationSession::new(
//!     layout,
//!     Arc::new(ZhangCalibrator::new(config.calibrator)),
//!     config.session_options(),
//! );
//! let detector = ChessboardDetector::new(config.board, config.chessboard);
//! let mut live = LiveLoop::new(session, Box::new(detector), LoopOptions::from_config(&config));
//!
//! let mut frames = ImageSequenceSource::open("frames/")?;
//! let report = live.run(&mut frames, &mut ScriptedKeys::parse("sssssc"))?;
//! println!("{report:?}");
//! # Ok(())
//! # }
//! ```

pub use arcalib_core as core;
pub use arcalib_session as session;
pub use arcalib_vision as vision;

mod config;
mod corners;
mod frames;
mod keys;
mod live;

pub use config::{ConfigError, LiveConfig};
pub use corners::{run_corners, CornersReport};
pub use frames::{CaptureError, FrameSource, ImageSequenceSource};
pub use keys::{Key, KeySource, ScriptedKeys, StdinKeys};
pub use live::{LiveError, LiveLoop, LoopExit, LoopOptions, LoopReport};

pub use arcalib_core::{ChessboardSpec, Detection, FrameSize, TargetLayout};
pub use arcalib_session::{CalibrationResult, CalibrationSession, DEFAULT_RESULT_FILE};
