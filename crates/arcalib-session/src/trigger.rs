use std::fmt;

use crate::{CalibrationResult, CalibratorError};

/// Samples required before a calibration request is honoured.
pub const DEFAULT_MIN_SAMPLES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerState {
    Collecting,
    Ready,
    Calibrating,
    Calibrated,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerState::Collecting => "collecting",
            TriggerState::Ready => "ready",
            TriggerState::Calibrating => "calibrating",
            TriggerState::Calibrated => "calibrated",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FailureCause {
    #[error("reprojection error {0} is not a positive finite number")]
    InvalidReprojectionError(f64),
    #[error(transparent)]
    Calibrator(#[from] CalibratorError),
    #[error("calibration was cancelled")]
    Cancelled,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TriggerError {
    #[error("insufficient samples: have {have}, need {need}")]
    InsufficientSamples { have: usize, need: usize },
    #[error("a calibration is already running")]
    CalibrationInProgress,
    #[error("calibration failed: {0}")]
    CalibrationFailed(FailureCause),
    #[error("no calibration is running")]
    NotCalibrating,
}

/// State machine gating the calibration computation.
///
/// The trigger never runs the calibrator itself: callers [`begin`] a run,
/// compute, then hand the outcome to [`finish`], which validates it. That
/// split lets the computation happen on another thread.
///
/// [`begin`]: Self::begin
/// [`finish`]: Self::finish
#[derive(Clone, Debug)]
pub struct CalibrationTrigger {
    min_samples: usize,
    state: TriggerState,
    result: Option<CalibrationResult>,
}

impl Default for CalibrationTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES)
    }
}

impl CalibrationTrigger {
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples: min_samples.max(1),
            state: TriggerState::Collecting,
            result: None,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// The calibration currently in force, if any.
    pub fn result(&self) -> Option<&CalibrationResult> {
        self.result.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.state == TriggerState::Calibrated
    }

    /// Record the store's new sample count.
    pub fn note_sample(&mut self, count: usize) {
        if self.state == TriggerState::Collecting && count >= self.min_samples {
            log::debug!("{count} samples collected, ready to calibrate");
            self.state = TriggerState::Ready;
        }
    }

    /// Enter `Calibrating` if `count` samples are enough.
    pub fn begin(&mut self, count: usize) -> Result<(), TriggerError> {
        if self.state == TriggerState::Calibrating {
            return Err(TriggerError::CalibrationInProgress);
        }
        if count < self.min_samples {
            return Err(TriggerError::InsufficientSamples {
                have: count,
                need: self.min_samples,
            });
        }
        self.state = TriggerState::Calibrating;
        Ok(())
    }

    /// Validate a calibrator outcome and leave `Calibrating`.
    ///
    /// A result is accepted only with a finite, strictly positive
    /// reprojection error. On failure any earlier result stays in force.
    pub fn finish(
        &mut self,
        outcome: Result<CalibrationResult, CalibratorError>,
    ) -> Result<&CalibrationResult, TriggerError> {
        if self.state != TriggerState::Calibrating {
            return Err(TriggerError::NotCalibrating);
        }

        let cause = match outcome {
            Ok(result) => {
                let err = result.reprojection_error();
                if err.is_finite() && err > 0.0 {
                    self.state = TriggerState::Calibrated;
                    return Ok(self.result.insert(result));
                }
                FailureCause::InvalidReprojectionError(err)
            }
            Err(e) => FailureCause::Calibrator(e),
        };

        self.fall_back();
        Err(TriggerError::CalibrationFailed(cause))
    }

    /// Leave `Calibrating` without a result.
    pub fn abort(&mut self) -> Result<(), TriggerError> {
        if self.state != TriggerState::Calibrating {
            return Err(TriggerError::NotCalibrating);
        }
        self.fall_back();
        Ok(())
    }

    /// Install a previously persisted calibration.
    pub fn adopt(&mut self, result: CalibrationResult) {
        self.result = Some(result);
        self.state = TriggerState::Calibrated;
    }

    /// Forget any result and start collecting again.
    pub fn reset(&mut self) {
        self.result = None;
        self.state = TriggerState::Collecting;
    }

    fn fall_back(&mut self) {
        self.state = if self.result.is_some() {
            TriggerState::Calibrated
        } else {
            TriggerState::Collecting
        };
    }
}
