//! Incremental camera-calibration workflow.
//!
//! A [`CalibrationSession`] owns the whole accumulation state of one live
//! calibration run:
//!
//! 1. detector output is paired with the session's fixed [`TargetLayout`]
//!    and checked by the [`SampleGate`],
//! 2. accepted [`ObservationSet`]s are appended to the
//!    [`CorrespondenceStore`],
//! 3. the [`CalibrationTrigger`] decides when a [`Calibrator`] may run,
//!    validates its output and gates pose-estimation features on success,
//! 4. the resulting [`CalibrationResult`] is written to a JSON file that a
//!    later session can load instead of collecting samples again.
//!
//! Calibration can run blocking ([`CalibrationSession::request_calibration`])
//! or on a worker thread ([`CalibrationSession::start_calibration`] +
//! [`CalibrationSession::poll_calibration`]).
//!
//! ```
//! use std::sync::Arc;
//! use arcalib_core::{ChessboardSpec, Detection, FrameSize, TargetLayout};
//! use arcalib_session::{
//!     CalibrationInput, CalibrationOutput, CalibrationSession, Calibrator, CalibratorError,
//!     SessionOptions,
//! };
//!
//! struct Fixed;
//!
//! impl Calibrator for Fixed {
//!     fn calibrate(&self, input: &CalibrationInput) -> Result<CalibrationOutput, CalibratorError> {
//!         Ok(CalibrationOutput::identity(input.views(), 0.4))
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = TargetLayout::from_chessboard(&ChessboardSpec::default())?;
//! let points = layout.points().iter().map(|p| nalgebra::Point2::new(p.x, p.y)).collect();
//! let detection = Detection::ordered(points);
//!
//! let options = SessionOptions { output_path: None, ..SessionOptions::default() };
//! let mut session = CalibrationSession::new(layout, Arc::new(Fixed), options);
//! for _ in 0..5 {
//!     session.offer(&detection, FrameSize::new(640, 480))?;
//! }
//! let result = session.request_calibration()?;
//! assert_eq!(result.reprojection_error(), 0.4);
//! # Ok(())
//! # }
//! ```

mod calibrator;
mod gate;
mod job;
mod observation;
mod result;
mod session;
mod store;
mod trigger;

pub use arcalib_core::TargetLayout;
pub use calibrator::{CalibrationInput, CalibrationOutput, Calibrator, CalibratorError};
pub use gate::{GateDecision, GateError, SampleGate};
pub use job::{CalibrationJob, JobOutcome};
pub use observation::ObservationSet;
pub use result::{CalibrationIoError, CalibrationResult, DEFAULT_RESULT_FILE};
pub use session::{CalibrationSession, SampleOutcome, SessionError, SessionOptions};
pub use store::CorrespondenceStore;
pub use trigger::{CalibrationTrigger, FailureCause, TriggerError, TriggerState, DEFAULT_MIN_SAMPLES};
