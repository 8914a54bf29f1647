use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arcalib_core::{ChessboardSpec, Detection, FrameSize, TargetLayout};
use arcalib_session::{
    CalibrationInput, CalibrationOutput, CalibrationResult, CalibrationSession, Calibrator,
    CalibratorError, FailureCause, GateError, SampleOutcome, SessionError, SessionOptions,
    TriggerError, TriggerState,
};
use nalgebra::{Matrix3, Point2};
use tempfile::tempdir;

const FRAME: FrameSize = FrameSize {
    width: 640,
    height: 480,
};

/// Returns a fixed reprojection error and counts invocations.
struct Mock {
    error: f64,
    calls: AtomicUsize,
}

impl Mock {
    fn new(error: f64) -> Arc<Self> {
        Arc::new(Self {
            error,
            calls: AtomicUsize::new(0),
        })
    }
}

impl Calibrator for Mock {
    fn calibrate(&self, input: &CalibrationInput) -> Result<CalibrationOutput, CalibratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = CalibrationOutput::identity(input.views(), self.error);
        out.camera_matrix = Matrix3::new(
            612.5, 0.0, 319.25, //
            0.0, 611.75, 241.125, //
            0.0, 0.0, 1.0,
        );
        out.dist_coeffs = [-0.21, 0.043, 0.0, 0.0, 0.0];
        Ok(out)
    }
}

fn layout() -> TargetLayout {
    TargetLayout::from_chessboard(&ChessboardSpec::default()).expect("layout")
}

fn full_detection(layout: &TargetLayout, shift: f64) -> Detection {
    Detection::ordered(
        layout
            .points()
            .iter()
            .map(|p| Point2::new(p.x * 2.0 + shift, p.y * 2.0 + shift))
            .collect(),
    )
}

fn session_with(calibrator: Arc<dyn Calibrator>, output: Option<std::path::PathBuf>) -> CalibrationSession {
    CalibrationSession::new(
        layout(),
        calibrator,
        SessionOptions {
            output_path: output,
            ..SessionOptions::default()
        },
    )
}

fn collect(session: &mut CalibrationSession, n: usize) {
    let layout = session.layout().clone();
    for i in 0..n {
        let outcome = session
            .offer(&full_detection(&layout, i as f64), FRAME)
            .expect("accepted");
        assert_eq!(outcome, SampleOutcome::Accepted { count: i + 1 });
    }
}

#[test]
fn mismatch_is_reported_and_store_is_untouched() {
    let mut session = session_with(Mock::new(1.0), None);
    collect(&mut session, 2);

    let det = Detection::with_ids(
        vec![Point2::new(1.0, 1.0), Point2::new(2.0, 2.0), Point2::new(3.0, 3.0)],
        vec![0, 1, 2],
    );
    // Three image points against a four-point reference.
    let four = TargetLayout::from_points(layout().points()[..4].to_vec());
    let mut small = CalibrationSession::new(four, Mock::new(1.0), SessionOptions::default());
    let err = small
        .offer(&Detection::ordered(det.image_points.clone()), FRAME)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Gate(GateError::CorrespondenceMismatch {
            image: 3,
            object: 4
        })
    ));
    assert_eq!(small.sample_count(), 0);

    // Unknown ids shorten the reference and surface the same way.
    let bad_ids = Detection::with_ids(det.image_points.clone(), vec![0, 1, 500]);
    assert!(matches!(
        session.offer(&bad_ids, FRAME),
        Err(SessionError::Gate(_))
    ));
    assert_eq!(session.sample_count(), 2);
}

#[test]
fn empty_detection_is_ignored_without_error() {
    let mut session = session_with(Mock::new(1.0), None);
    let outcome = session.offer(&Detection::default(), FRAME).expect("no error");
    assert_eq!(outcome, SampleOutcome::NotVisible);
    assert_eq!(session.sample_count(), 0);
    assert_eq!(session.state(), TriggerState::Collecting);
}

#[test]
fn four_samples_are_insufficient() {
    let mock = Mock::new(1.2);
    let mut session = session_with(mock.clone(), None);
    collect(&mut session, 4);

    let err = session.request_calibration().unwrap_err();
    assert!(matches!(
        err,
        SessionError::Trigger(TriggerError::InsufficientSamples { have: 4, need: 5 })
    ));
    assert_eq!(session.state(), TriggerState::Collecting);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn successful_calibration_is_persisted() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("out").join("calibration.json");
    let mut session = session_with(Mock::new(1.2), Some(path.clone()));
    collect(&mut session, 5);
    assert_eq!(session.state(), TriggerState::Ready);

    let result = session.request_calibration().expect("calibrated");
    assert_eq!(result.reprojection_error(), 1.2);
    assert_eq!(result.sample_count(), 5);
    assert_eq!(session.state(), TriggerState::Calibrated);

    let saved = CalibrationResult::load_json(&path).expect("persisted");
    assert_eq!(saved.reprojection_error(), 1.2);
    assert_eq!(saved.frame_size(), FRAME);
    assert_eq!(saved.image_points().len(), 5);
    assert_eq!(saved.object_points()[0].len(), 54);
}

#[test]
fn zero_or_nan_error_fails_without_persisting() {
    for bad in [0.0, f64::NAN] {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("calibration.json");
        let mut session = session_with(Mock::new(bad), Some(path.clone()));
        collect(&mut session, 5);

        let err = session.request_calibration().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Trigger(TriggerError::CalibrationFailed(
                FailureCause::InvalidReprojectionError(_)
            ))
        ));
        assert_eq!(session.state(), TriggerState::Collecting);
        assert!(session.result().is_none());
        assert!(!path.exists());
    }
}

#[test]
fn persisted_result_reloads_bit_exact() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("calibration.json");
    let mut first = session_with(Mock::new(0.3141592653589793), Some(path.clone()));
    collect(&mut first, 6);
    let original = first.request_calibration().expect("calibrated").clone();

    let mut second = session_with(Mock::new(1.0), None);
    let loaded = second.load_calibration(&path).expect("loaded").clone();
    assert_eq!(second.state(), TriggerState::Calibrated);
    assert_eq!(second.sample_count(), 0);

    for (a, b) in loaded.camera_matrix().iter().zip(original.camera_matrix().iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    for (a, b) in loaded.dist_coeffs().iter().zip(original.dist_coeffs()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    assert_eq!(loaded, original);
}

#[test]
fn background_calibration_reaches_calibrated() {
    let mut session = session_with(Mock::new(0.8), None);
    collect(&mut session, 5);
    session.start_calibration().expect("started");
    assert!(session.is_calibrating());

    // Samples keep flowing while the worker runs.
    let layout = session.layout().clone();
    session
        .offer(&full_detection(&layout, 9.0), FRAME)
        .expect("accepted while calibrating");

    assert!(matches!(
        session.request_calibration(),
        Err(SessionError::Trigger(TriggerError::CalibrationInProgress))
    ));

    let result = session
        .wait_calibration()
        .expect("job was running")
        .expect("calibrated");
    assert_eq!(result.sample_count(), 5);
    assert!(session.is_calibrated());
    assert_eq!(session.sample_count(), 6);
}

#[test]
fn polling_picks_up_a_finished_background_job() {
    let mut session = session_with(Mock::new(0.5), None);
    collect(&mut session, 5);
    session.start_calibration().expect("started");

    let deadline = Instant::now() + Duration::from_secs(10);
    let error = loop {
        if let Some(outcome) = session.poll_calibration() {
            break outcome.expect("calibrated").reprojection_error();
        }
        assert!(Instant::now() < deadline, "job never reported");
        std::thread::sleep(Duration::from_millis(5));
    };
    assert_eq!(error, 0.5);
    assert!(session.is_calibrated());
    assert!(!session.is_calibrating());
    // The job is consumed by the first successful poll.
    assert!(session.poll_calibration().is_none());
}

#[test]
fn unwritable_output_keeps_the_result_in_force() {
    let dir = tempdir().expect("tempdir");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"plain file").expect("write");
    let path = blocker.join("calibration.json");
    let mut session = session_with(Mock::new(0.7), Some(path.clone()));
    collect(&mut session, 5);

    let err = session.request_calibration().unwrap_err();
    assert!(matches!(err, SessionError::Persist { path: ref p, .. } if *p == path));
    assert_eq!(session.state(), TriggerState::Calibrated);
    let result = session.result().expect("result kept");
    assert_eq!(result.reprojection_error(), 0.7);
    assert_eq!(result.sample_count(), 5);
    assert!(!path.exists());
}

#[test]
fn cancelled_job_returns_to_collecting() {
    let mut session = session_with(Mock::new(0.8), None);
    collect(&mut session, 5);
    session.start_calibration().expect("started");
    assert!(session.cancel_calibration());
    assert_eq!(session.state(), TriggerState::Collecting);
    assert!(session.poll_calibration().is_none());
    assert!(!session.cancel_calibration());
}

#[test]
fn frame_size_must_stay_constant() {
    let mut session = session_with(Mock::new(1.0), None);
    collect(&mut session, 1);
    let layout = session.layout().clone();
    let err = session
        .offer(&full_detection(&layout, 0.0), FrameSize::new(1280, 720))
        .unwrap_err();
    assert!(matches!(err, SessionError::FrameSizeChanged { .. }));
    assert_eq!(session.sample_count(), 1);
}

#[test]
fn reset_clears_samples_and_result() {
    let mut session = session_with(Mock::new(1.0), None);
    collect(&mut session, 5);
    session.request_calibration().expect("calibrated");
    session.reset();
    assert_eq!(session.sample_count(), 0);
    assert_eq!(session.state(), TriggerState::Collecting);
    assert!(session.result().is_none());
    assert!(session.frame_size().is_none());
}

#[test]
fn missing_calibration_file_is_a_load_error() {
    let dir = tempdir().expect("tempdir");
    let mut session = session_with(Mock::new(1.0), None);
    let err = session
        .load_calibration(dir.path().join("absent.json"))
        .unwrap_err();
    assert!(matches!(err, SessionError::Load { .. }));
    assert_eq!(session.state(), TriggerState::Collecting);
}
