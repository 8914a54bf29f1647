use std::path::{Path, PathBuf};
use std::sync::Arc;

use arcalib_core::{Detection, FrameSize, TargetLayout};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    CalibrationIoError, CalibrationJob, CalibrationResult, CalibrationTrigger, Calibrator,
    CorrespondenceStore, GateDecision, GateError, JobOutcome, SampleGate, TriggerError,
    TriggerState, DEFAULT_MIN_SAMPLES, DEFAULT_RESULT_FILE,
};

#[derive(Clone, Debug, PartialEq)]
pub struct SessionOptions {
    /// Samples required before calibration may run.
    pub min_samples: usize,
    /// Where a successful calibration is written; `None` disables persistence.
    pub output_path: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            output_path: Some(PathBuf::from(DEFAULT_RESULT_FILE)),
        }
    }
}

/// Outcome of offering one frame's detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Stored; `count` is the new number of samples.
    Accepted { count: usize },
    /// The target was not visible. Not an error.
    NotVisible,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error("frame size changed from {expected} to {got}")]
    FrameSizeChanged { expected: FrameSize, got: FrameSize },
    #[error("no frame size known yet")]
    UnknownFrameSize,
    #[error("failed to persist calibration to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: CalibrationIoError,
    },
    #[error("failed to load calibration from {}: {source}", path.display())]
    Load {
        path: PathBuf,
        source: CalibrationIoError,
    },
    #[error("failed to start calibration worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Everything one live calibration run accumulates.
///
/// The session is owned by the frame loop; detector output enters through
/// [`offer`](Self::offer) as explicit values and nothing is shared with
/// other threads except the snapshot handed to a background job.
pub struct CalibrationSession {
    layout: TargetLayout,
    gate: SampleGate,
    store: CorrespondenceStore,
    trigger: CalibrationTrigger,
    calibrator: Arc<dyn Calibrator>,
    options: SessionOptions,
    frame_size: Option<FrameSize>,
    job: Option<CalibrationJob>,
}

impl CalibrationSession {
    pub fn new(layout: TargetLayout, calibrator: Arc<dyn Calibrator>, options: SessionOptions) -> Self {
        Self {
            layout,
            gate: SampleGate::new(),
            store: CorrespondenceStore::new(),
            trigger: CalibrationTrigger::new(options.min_samples),
            calibrator,
            options,
            frame_size: None,
            job: None,
        }
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    pub fn store(&self) -> &CorrespondenceStore {
        &self.store
    }

    pub fn sample_count(&self) -> usize {
        self.store.count()
    }

    pub fn min_samples(&self) -> usize {
        self.trigger.min_samples()
    }

    pub fn state(&self) -> TriggerState {
        self.trigger.state()
    }

    pub fn result(&self) -> Option<&CalibrationResult> {
        self.trigger.result()
    }

    pub fn is_calibrated(&self) -> bool {
        self.trigger.is_calibrated()
    }

    pub fn is_calibrating(&self) -> bool {
        self.trigger.state() == TriggerState::Calibrating
    }

    pub fn frame_size(&self) -> Option<FrameSize> {
        self.frame_size
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Offer one frame's detection as a calibration sample.
    ///
    /// The detection is paired with the layout's reference points and run
    /// through the gate; on acceptance the sample is stored.
    pub fn offer(
        &mut self,
        detection: &Detection,
        frame_size: FrameSize,
    ) -> Result<SampleOutcome, SessionError> {
        let reference = self.layout.reference_for(detection);
        let observation = match self.gate.admit(detection.image_points.clone(), reference)? {
            GateDecision::NotVisible => {
                log::debug!("target not visible, nothing stored");
                return Ok(SampleOutcome::NotVisible);
            }
            GateDecision::Accepted(observation) => observation,
        };

        match self.frame_size {
            Some(expected) if expected != frame_size => {
                return Err(SessionError::FrameSizeChanged {
                    expected,
                    got: frame_size,
                });
            }
            Some(_) => {}
            None => self.frame_size = Some(frame_size),
        }

        let points = observation.len();
        let count = self.store.add(observation);
        self.trigger.note_sample(count);
        log::info!("sample {count} stored ({points} points)");
        Ok(SampleOutcome::Accepted { count })
    }

    /// Calibrate on the calling thread.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self), fields(samples = self.store.count()))
    )]
    pub fn request_calibration(&mut self) -> Result<&CalibrationResult, SessionError> {
        let input = self.begin()?;
        let outcome = self
            .calibrator
            .calibrate(&input)
            .map(|output| CalibrationResult::from_output(output, &input));
        self.complete(outcome)
    }

    /// Calibrate on a worker thread; poll with
    /// [`poll_calibration`](Self::poll_calibration).
    pub fn start_calibration(&mut self) -> Result<(), SessionError> {
        let input = self.begin()?;
        match CalibrationJob::spawn(Arc::clone(&self.calibrator), input) {
            Ok(job) => {
                log::info!("calibrating from {} samples in the background", job.views());
                self.job = Some(job);
                Ok(())
            }
            Err(e) => {
                self.trigger.abort()?;
                Err(SessionError::Spawn(e))
            }
        }
    }

    /// Collect a background result if one is ready.
    pub fn poll_calibration(&mut self) -> Option<Result<&CalibrationResult, SessionError>> {
        let outcome = self.job.as_mut()?.try_finish()?;
        self.job = None;
        Some(self.complete(outcome))
    }

    /// Block until the background job, if any, reports.
    pub fn wait_calibration(&mut self) -> Option<Result<&CalibrationResult, SessionError>> {
        let outcome = self.job.take()?.wait();
        Some(self.complete(outcome))
    }

    /// Drop a running background job. Returns whether one was running.
    pub fn cancel_calibration(&mut self) -> bool {
        let Some(job) = self.job.take() else {
            return false;
        };
        job.cancel();
        if let Err(e) = self.trigger.abort() {
            log::debug!("cancel: {e}");
        }
        log::info!("calibration cancelled");
        true
    }

    /// Seed the session with a persisted calibration.
    pub fn load_calibration(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<&CalibrationResult, SessionError> {
        if self.job.is_some() {
            return Err(TriggerError::CalibrationInProgress.into());
        }
        let path = path.as_ref();
        let result = CalibrationResult::load_json(path).map_err(|source| SessionError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let size = result.frame_size();
        match self.frame_size {
            Some(expected) if expected != size => {
                return Err(SessionError::FrameSizeChanged {
                    expected,
                    got: size,
                });
            }
            _ => self.frame_size = Some(size),
        }

        log::info!(
            "loaded calibration from {} (rms {:.4})",
            path.display(),
            result.reprojection_error()
        );
        self.trigger.adopt(result);
        Ok(self.trigger.result().ok_or(TriggerError::NotCalibrating)?)
    }

    /// Drop all samples and any calibration, cancelling a running job.
    pub fn reset(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancel();
        }
        self.store.reset();
        self.trigger.reset();
        self.frame_size = None;
        log::info!("session reset");
    }

    fn begin(&mut self) -> Result<crate::CalibrationInput, SessionError> {
        self.trigger.begin(self.store.count())?;
        match self.frame_size {
            Some(size) => Ok(self.store.snapshot(size)),
            None => {
                self.trigger.abort()?;
                Err(SessionError::UnknownFrameSize)
            }
        }
    }

    fn complete(&mut self, outcome: JobOutcome) -> Result<&CalibrationResult, SessionError> {
        let result = match self.trigger.finish(outcome) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("{e}");
                return Err(e.into());
            }
        };
        log::info!(
            "calibrated from {} samples, rms {:.4} px",
            result.sample_count(),
            result.reprojection_error()
        );

        if let Some(path) = &self.options.output_path {
            result.write_json(path).map_err(|source| SessionError::Persist {
                path: path.clone(),
                source,
            })?;
            log::info!("calibration written to {}", path.display());
        }
        Ok(result)
    }
}

impl std::fmt::Debug for CalibrationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationSession")
            .field("samples", &self.store.count())
            .field("state", &self.trigger.state())
            .field("frame_size", &self.frame_size)
            .field("job", &self.job)
            .finish()
    }
}
