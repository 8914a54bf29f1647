//! Calibration on a worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::{CalibrationInput, CalibrationResult, Calibrator, CalibratorError};

/// What a finished job yields.
pub type JobOutcome = Result<CalibrationResult, CalibratorError>;

/// One calibrator run over a snapshot of the store.
///
/// The worker owns its copy of the correspondences, so the frame loop may
/// keep adding samples while it runs. The outcome comes back over a
/// single-slot channel.
pub struct CalibrationJob {
    rx: Receiver<JobOutcome>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    views: usize,
}

impl CalibrationJob {
    pub fn spawn(
        calibrator: Arc<dyn Calibrator>,
        input: CalibrationInput,
    ) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<JobOutcome>(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let views = input.views();

        let handle = std::thread::Builder::new()
            .name("calibration".to_string())
            .spawn(move || {
                log::debug!("calibrating from {} views", input.views());
                let outcome = calibrator
                    .calibrate(&input)
                    .map(|output| CalibrationResult::from_output(output, &input));
                if flag.load(Ordering::Acquire) {
                    log::debug!("calibration finished after cancellation; discarding");
                    return;
                }
                // The receiver is gone when the job was dropped.
                let _ = tx.send(outcome);
            })?;

        Ok(Self {
            rx,
            cancelled,
            handle: Some(handle),
            views,
        })
    }

    /// Number of samples the job calibrates from.
    pub fn views(&self) -> usize {
        self.views
    }

    /// Non-blocking poll; `None` while the worker is still running.
    pub fn try_finish(&mut self) -> Option<JobOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => {
                self.join();
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(CalibratorError::Backend(
                    "calibration worker exited without a result".to_string(),
                )))
            }
        }
    }

    /// Block until the worker reports.
    pub fn wait(mut self) -> JobOutcome {
        let outcome = self.rx.recv().unwrap_or_else(|_| {
            Err(CalibratorError::Backend(
                "calibration worker exited without a result".to_string(),
            ))
        });
        self.join();
        outcome
    }

    /// Ask the worker to drop its outcome. Does not block; the calibrator
    /// itself is not interrupted.
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("calibration worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for CalibrationJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationJob")
            .field("views", &self.views)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
