//! The frame-driven accumulate / calibrate / overlay loop.
//!
//! One iteration: capture, detect, annotate, poll a background calibration,
//! wait for a key. The key wait paces the loop and is the only point where
//! the loop reacts to the user.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arcalib_core::{Detection, FrameSize};
use arcalib_session::{CalibrationSession, SampleOutcome, SessionError};
use arcalib_vision::{
    axis_segments, draw_axes, draw_detection, draw_segments, estimate_planar_pose,
    project_segments, pyramid_segments, Frame, TargetDetector, RED,
};
use image::RgbImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{CaptureError, FrameSource, Key, KeySource, LiveConfig};

#[derive(thiserror::Error, Debug)]
pub enum LiveError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("failed to save frame {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Why a loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    EndOfStream,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub frames: usize,
    pub samples: usize,
    /// Sample requests the gate turned down.
    pub rejected: usize,
    /// Frames that got a pose overlay.
    pub poses: usize,
    pub reprojection_error: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopOptions {
    pub key_delay: Duration,
    pub blocking: bool,
    pub pyramid_base: f64,
    pub axis_length: f64,
    /// Write every annotated frame here as `frame_NNNNN.png`.
    pub save_dir: Option<PathBuf>,
    /// Write the raw frame of every accepted sample here as `sample_NNN.png`.
    pub sample_dir: Option<PathBuf>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        LoopOptions::from_config(&LiveConfig::default())
    }
}

impl LoopOptions {
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            key_delay: config.key_delay(),
            blocking: config.blocking,
            pyramid_base: config.pyramid_base,
            axis_length: config.axis_length,
            save_dir: None,
            sample_dir: None,
        }
    }
}

pub struct LiveLoop {
    session: CalibrationSession,
    detector: Box<dyn TargetDetector>,
    options: LoopOptions,
}

impl LiveLoop {
    pub fn new(
        session: CalibrationSession,
        detector: Box<dyn TargetDetector>,
        options: LoopOptions,
    ) -> Self {
        Self {
            session,
            detector,
            options,
        }
    }

    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    pub fn into_session(self) -> CalibrationSession {
        self.session
    }

    /// Run until a quit key or the end of the stream.
    ///
    /// On quit a pending background calibration is cancelled; at the end of
    /// the stream it is awaited.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(detector = self.detector.name()))
    )]
    pub fn run(
        &mut self,
        frames: &mut dyn FrameSource,
        keys: &mut dyn KeySource,
    ) -> Result<LoopReport, LiveError> {
        let mut report = LoopReport {
            exit: LoopExit::EndOfStream,
            frames: 0,
            samples: self.session.sample_count(),
            rejected: 0,
            poses: 0,
            reprojection_error: None,
        };

        while let Some(frame) = frames.next_frame()? {
            report.frames += 1;
            let detection = self.detect(&frame);

            let mut annotated = frame.image.clone();
            draw_detection(&mut annotated, &detection);
            if self.draw_pose(&mut annotated, &detection) {
                report.poses += 1;
            }

            if let Some(outcome) = self.session.poll_calibration() {
                log_calibration(outcome.map(|r| r.reprojection_error()));
            }

            if let Some(dir) = &self.options.save_dir {
                save_annotated(dir, frame.index, &annotated)?;
            }

            match keys.wait_key(self.options.key_delay) {
                Key::Quit => {
                    if self.session.cancel_calibration() {
                        log::warn!("quit with a calibration running; result discarded");
                    }
                    report.exit = LoopExit::Quit;
                    break;
                }
                Key::Sample => match self.sample(&detection, frame.size()) {
                    Some(SampleOutcome::Accepted { count }) => {
                        if let Some(dir) = &self.options.sample_dir {
                            save_png(dir.join(format!("sample_{count:03}.png")), &frame.image)?;
                        }
                    }
                    Some(SampleOutcome::NotVisible) => {}
                    None => report.rejected += 1,
                },
                Key::Calibrate => self.calibrate(),
                Key::Idle => {}
            }
        }

        if report.exit == LoopExit::EndOfStream {
            log::info!("end of stream after {} frames", report.frames);
            if let Some(outcome) = self.session.wait_calibration() {
                log_calibration(outcome.map(|r| r.reprojection_error()));
            }
        }

        report.samples = self.session.sample_count();
        report.reprojection_error = self.session.result().map(|r| r.reprojection_error());
        Ok(report)
    }

    fn detect(&self, frame: &Frame) -> Detection {
        match self.detector.detect(frame) {
            Ok(detection) => detection,
            Err(e) => {
                log::warn!("frame {}: {e}", frame.index);
                Detection::default()
            }
        }
    }

    /// `None` when the gate or the frame-size check rejected it.
    fn sample(&mut self, detection: &Detection, size: FrameSize) -> Option<SampleOutcome> {
        match self.session.offer(detection, size) {
            Ok(outcome @ SampleOutcome::Accepted { count }) => {
                let need = self.session.min_samples();
                if count < need {
                    log::info!("{count}/{need} samples");
                } else {
                    log::info!("{count} samples; press c to calibrate");
                }
                Some(outcome)
            }
            Ok(SampleOutcome::NotVisible) => {
                log::info!("target not visible; no sample taken");
                Some(SampleOutcome::NotVisible)
            }
            Err(e) => {
                log::warn!("sample rejected: {e}");
                None
            }
        }
    }

    fn calibrate(&mut self) {
        if self.options.blocking {
            let outcome = self.session.request_calibration().map(|r| r.reprojection_error());
            log_calibration(outcome);
        } else if let Err(e) = self.session.start_calibration() {
            log::warn!("{e}");
        }
    }

    /// Pyramid and axes for the current detection, once calibrated.
    fn draw_pose(&self, img: &mut RgbImage, detection: &Detection) -> bool {
        let Some(result) = self.session.result() else {
            return false;
        };
        if detection.is_empty() {
            return false;
        }
        let object = self.session.layout().reference_for(detection);
        if object.len() != detection.len() {
            return false;
        }
        let intrinsics = result.intrinsics();
        let dist = result.dist_coeffs();
        let Some(pose) = estimate_planar_pose(&intrinsics, dist, &object, &detection.image_points)
        else {
            log::debug!("no pose for this detection");
            return false;
        };

        let pyramid = project_segments(
            &pyramid_segments(self.options.pyramid_base),
            &pose,
            &intrinsics,
            dist,
        );
        draw_segments(img, &pyramid, RED);
        let axes = project_segments(
            &axis_segments(self.options.axis_length),
            &pose,
            &intrinsics,
            dist,
        );
        if axes.len() == 3 {
            draw_axes(img, &axes);
        }
        true
    }
}

fn log_calibration(outcome: Result<f64, SessionError>) {
    match outcome {
        Ok(rms) => log::info!("calibrated, reprojection error {rms:.4} px"),
        // Persisting failed but the calibration itself is in force.
        Err(e @ SessionError::Persist { .. }) => log::error!("{e}"),
        Err(e) => log::warn!("{e}"),
    }
}

pub(crate) fn save_annotated(dir: &Path, index: usize, img: &RgbImage) -> Result<(), LiveError> {
    save_png(dir.join(format!("frame_{index:05}.png")), img)
}

fn save_png(path: PathBuf, img: &RgbImage) -> Result<(), LiveError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let saved = std::fs::create_dir_all(parent)
        .map_err(image::ImageError::IoError)
        .and_then(|_| img.save_with_format(&path, image::ImageFormat::Png));
    saved.map_err(|source| LiveError::Save { path, source })
}
