//! Calibration result and its JSON file format.

use std::fmt;
use std::path::Path;

use arcalib_core::{
    pose_from_rodrigues, read_json, write_json, CameraIntrinsics, FrameSize, JsonIoError,
    DISTORTION_COEFFS,
};
use nalgebra::{Isometry3, Matrix3};
use serde::{Deserialize, Serialize};

use crate::{CalibrationInput, CalibrationOutput};

/// File name used when no output path is configured.
pub const DEFAULT_RESULT_FILE: &str = "chessboard_calibration_results.json";

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Json(#[from] JsonIoError),
    #[error("invalid calibration file: {0}")]
    Invalid(String),
}

/// A validated camera calibration.
///
/// The serialized form is the calibration file: frame size, 3x3 camera
/// matrix (row-major), distortion `[k1, k2, p1, p2, k3]`, RMS reprojection
/// error, per-sample Rodrigues rotations and translations, and the raw
/// correspondences the calibration was computed from. The last four fields
/// may be absent in files written by other tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    frame_width: u32,
    frame_height: u32,
    camera_matrix: [[f64; 3]; 3],
    dist_coeffs: [f64; DISTORTION_COEFFS],
    reprojection_error: f64,
    #[serde(default)]
    rotation_vectors: Vec<[f64; 3]>,
    #[serde(default)]
    translation_vectors: Vec<[f64; 3]>,
    #[serde(default)]
    image_points: Vec<Vec<[f64; 2]>>,
    #[serde(default)]
    object_points: Vec<Vec<[f64; 3]>>,
}

impl CalibrationResult {
    /// Combine calibrator output with the correspondences it was fed.
    pub fn from_output(output: CalibrationOutput, input: &CalibrationInput) -> Self {
        let k = output.camera_matrix;
        Self {
            frame_width: input.frame_size.width,
            frame_height: input.frame_size.height,
            camera_matrix: [
                [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
                [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
                [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
            ],
            dist_coeffs: output.dist_coeffs,
            reprojection_error: output.reprojection_error,
            rotation_vectors: output.rotation_vectors,
            translation_vectors: output.translation_vectors,
            image_points: input
                .image_points
                .iter()
                .map(|view| view.iter().map(|p| [p.x, p.y]).collect())
                .collect(),
            object_points: input
                .object_points
                .iter()
                .map(|view| view.iter().map(|p| [p.x, p.y, p.z]).collect())
                .collect(),
        }
    }

    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.frame_width, self.frame_height)
    }

    pub fn camera_matrix(&self) -> Matrix3<f64> {
        let m = &self.camera_matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::from_matrix(&self.camera_matrix())
    }

    pub fn dist_coeffs(&self) -> &[f64; DISTORTION_COEFFS] {
        &self.dist_coeffs
    }

    pub fn reprojection_error(&self) -> f64 {
        self.reprojection_error
    }

    pub fn rotation_vectors(&self) -> &[[f64; 3]] {
        &self.rotation_vectors
    }

    pub fn translation_vectors(&self) -> &[[f64; 3]] {
        &self.translation_vectors
    }

    /// Target-to-camera pose of every sample that carries one.
    pub fn sample_poses(&self) -> Vec<Isometry3<f64>> {
        self.rotation_vectors
            .iter()
            .zip(&self.translation_vectors)
            .map(|(r, t)| pose_from_rodrigues(r, t))
            .collect()
    }

    /// Number of samples whose correspondences were recorded.
    pub fn sample_count(&self) -> usize {
        self.image_points.len()
    }

    pub fn image_points(&self) -> &[Vec<[f64; 2]>] {
        &self.image_points
    }

    pub fn object_points(&self) -> &[Vec<[f64; 3]>] {
        &self.object_points
    }

    /// Load and sanity-check a calibration file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let result: Self = read_json(path)?;
        result.validate()?;
        Ok(result)
    }

    /// Write the calibration file as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        write_json(self, path)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), CalibrationIoError> {
        let k = self.camera_matrix();
        if !k.iter().all(|v| v.is_finite()) || k[(0, 0)] <= 0.0 || k[(1, 1)] <= 0.0 {
            return Err(CalibrationIoError::Invalid(
                "camera_matrix needs finite, positive focal lengths".to_string(),
            ));
        }
        if !(self.reprojection_error.is_finite() && self.reprojection_error > 0.0) {
            return Err(CalibrationIoError::Invalid(format!(
                "reprojection_error must be finite and > 0, got {}",
                self.reprojection_error
            )));
        }
        if self.rotation_vectors.len() != self.translation_vectors.len() {
            return Err(CalibrationIoError::Invalid(format!(
                "{} rotation vectors but {} translation vectors",
                self.rotation_vectors.len(),
                self.translation_vectors.len()
            )));
        }
        if self.image_points.len() != self.object_points.len() {
            return Err(CalibrationIoError::Invalid(format!(
                "{} image point lists but {} object point lists",
                self.image_points.len(),
                self.object_points.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CalibrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = self.intrinsics();
        writeln!(f, "Frame size: {}", self.frame_size())?;
        writeln!(f, "Reprojection error: {:.6}", self.reprojection_error)?;
        writeln!(f, "Camera matrix:")?;
        for row in &self.camera_matrix {
            writeln!(f, "  [{:12.4} {:12.4} {:12.4}]", row[0], row[1], row[2])?;
        }
        writeln!(f, "Distortion coefficients: {:?}", self.dist_coeffs)?;
        writeln!(f, "Focal length fx: {:.4}", k.fx)?;
        writeln!(f, "Focal length fy: {:.4}", k.fy)?;
        writeln!(f, "Principal point u0: {:.4}", k.cx)?;
        writeln!(f, "Principal point v0: {:.4}", k.cy)?;
        write!(
            f,
            "Rotation vectors: {}, translation vectors: {}",
            self.rotation_vectors.len(),
            self.translation_vectors.len()
        )
    }
}
