use arcalib_core::{FrameSize, DISTORTION_COEFFS};
use nalgebra::{Matrix3, Point2, Point3};

/// Correspondences handed to a [`Calibrator`], one entry per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationInput {
    pub frame_size: FrameSize,
    pub object_points: Vec<Vec<Point3<f64>>>,
    pub image_points: Vec<Vec<Point2<f64>>>,
}

impl CalibrationInput {
    pub fn views(&self) -> usize {
        self.image_points.len()
    }
}

/// Raw calibrator output, before the trigger validates it.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationOutput {
    pub camera_matrix: Matrix3<f64>,
    pub dist_coeffs: [f64; DISTORTION_COEFFS],
    /// Per-sample Rodrigues rotation vectors.
    pub rotation_vectors: Vec<[f64; 3]>,
    /// Per-sample translations, in the unit of the reference points.
    pub translation_vectors: Vec<[f64; 3]>,
    /// RMS reprojection error in pixels.
    pub reprojection_error: f64,
}

impl CalibrationOutput {
    /// Identity intrinsics with `views` zero poses; handy for stub calibrators.
    pub fn identity(views: usize, reprojection_error: f64) -> Self {
        Self {
            camera_matrix: Matrix3::identity(),
            dist_coeffs: [0.0; DISTORTION_COEFFS],
            rotation_vectors: vec![[0.0; 3]; views],
            translation_vectors: vec![[0.0; 3]; views],
            reprojection_error,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibratorError {
    #[error("need at least {need} views, got {have}")]
    NotEnoughViews { have: usize, need: usize },
    #[error("view {view}: need at least {need} points, got {have}")]
    NotEnoughPoints { view: usize, have: usize, need: usize },
    #[error("view {view}: {image} image points vs {object} object points")]
    LengthMismatch {
        view: usize,
        image: usize,
        object: usize,
    },
    #[error("view {view}: reference points are not on the z = 0 plane")]
    NonPlanarTarget { view: usize },
    #[error("view {view}: homography estimation failed")]
    DegenerateView { view: usize },
    #[error("degenerate configuration: {0}")]
    DegenerateConfiguration(String),
    #[error("calibration backend failed: {0}")]
    Backend(String),
}

/// The camera-calibration solver seam.
///
/// Implementations receive every accumulated sample and return intrinsics,
/// distortion, per-sample poses and the RMS reprojection error. They run on
/// the calibration worker thread, hence `Send + Sync`.
pub trait Calibrator: Send + Sync {
    fn calibrate(&self, input: &CalibrationInput) -> Result<CalibrationOutput, CalibratorError>;
}
