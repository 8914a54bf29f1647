//! Closed-form planar camera calibration (Zhang's method).
//!
//! Each view contributes a plane-to-image homography; two constraints per
//! homography on the image of the absolute conic `B = K^-T K^-1` give the
//! intrinsics linearly. Skew is always zero. Optional linear estimation of
//! the radial terms `k1`, `k2` alternates with re-fitting the homographies on
//! undistorted points.

use arcalib_core::{
    estimate_homography, project_point, rodrigues_from_rotation, undistort_pixel,
    CameraIntrinsics, FrameSize, Homography, DISTORTION_COEFFS,
};
use arcalib_session::{CalibrationInput, CalibrationOutput, Calibrator, CalibratorError};
use nalgebra::{DMatrix, Isometry3, Matrix2, Matrix3, Point2, SVector, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::pose::pose_from_homography;

const MIN_VIEWS: usize = 3;
const MIN_POINTS: usize = 4;
const PLANE_EPS: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZhangOptions {
    /// Force `fx == fy`.
    pub fix_aspect_ratio: bool,
    /// Pin the principal point to the frame center.
    pub fix_principal_point: bool,
    /// Fit `k1`, `k2`; tangential terms and `k3` stay zero either way.
    pub estimate_distortion: bool,
    /// Alternations between intrinsics and distortion.
    pub distortion_iterations: usize,
}

impl Default for ZhangOptions {
    fn default() -> Self {
        Self {
            fix_aspect_ratio: true,
            fix_principal_point: false,
            estimate_distortion: true,
            distortion_iterations: 4,
        }
    }
}

/// [`Calibrator`] backed by the linear Zhang solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZhangCalibrator {
    pub options: ZhangOptions,
}

impl ZhangCalibrator {
    pub fn new(options: ZhangOptions) -> Self {
        Self { options }
    }
}

impl Calibrator for ZhangCalibrator {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, input), fields(views = input.views()))
    )]
    fn calibrate(&self, input: &CalibrationInput) -> Result<CalibrationOutput, CalibratorError> {
        validate(input)?;

        let planes: Vec<Vec<Point2<f64>>> = input
            .object_points
            .iter()
            .map(|view| view.iter().map(|p| Point2::new(p.x, p.y)).collect())
            .collect();

        let mut dist = [0.0; DISTORTION_COEFFS];
        let mut k = self.solve_intrinsics(input.frame_size, &planes, &input.image_points)?;
        let mut poses = view_poses(&k, &planes, &input.image_points)?;

        if self.options.estimate_distortion {
            for iter in 0..self.options.distortion_iterations {
                let Some((k1, k2)) = fit_radial(&k, &poses, input) else {
                    log::debug!("radial fit is singular at iteration {iter}; keeping {dist:?}");
                    break;
                };
                dist[0] = k1;
                dist[1] = k2;

                let intr = CameraIntrinsics::from_matrix(&k);
                let undistorted: Vec<Vec<Point2<f64>>> = input
                    .image_points
                    .iter()
                    .map(|view| {
                        view.iter()
                            .map(|&p| intr.to_pixel(undistort_pixel(p, &intr, &dist)))
                            .collect()
                    })
                    .collect();
                k = self.solve_intrinsics(input.frame_size, &planes, &undistorted)?;
                poses = view_poses(&k, &planes, &undistorted)?;
            }
        }

        let reprojection_error = rms_error(&k, &dist, &poses, input);
        log::debug!(
            "zhang: fx={:.3} fy={:.3} cx={:.3} cy={:.3} k1={:.5} k2={:.5} rms={reprojection_error:.4}",
            k[(0, 0)],
            k[(1, 1)],
            k[(0, 2)],
            k[(1, 2)],
            dist[0],
            dist[1],
        );

        Ok(CalibrationOutput {
            camera_matrix: k,
            dist_coeffs: dist,
            rotation_vectors: poses.iter().map(|p| rodrigues_from_rotation(&p.rotation)).collect(),
            translation_vectors: poses
                .iter()
                .map(|p| {
                    let t = p.translation.vector;
                    [t.x, t.y, t.z]
                })
                .collect(),
            reprojection_error,
        })
    }
}

impl ZhangCalibrator {
    fn solve_intrinsics(
        &self,
        frame: FrameSize,
        planes: &[Vec<Point2<f64>>],
        images: &[Vec<Point2<f64>>],
    ) -> Result<Matrix3<f64>, CalibratorError> {
        // Condition pixels to roughly [-1, 1] around the frame center.
        let c = frame.center();
        let s = 2.0 / (frame.width as f64 + frame.height as f64).max(1.0);
        let t_inv = Matrix3::new(1.0 / s, 0.0, c.x, 0.0, 1.0 / s, c.y, 0.0, 0.0, 1.0);

        let mut homographies = Vec::with_capacity(planes.len());
        for (view, (plane, image)) in planes.iter().zip(images).enumerate() {
            let conditioned: Vec<Point2<f64>> = image
                .iter()
                .map(|p| Point2::new(s * (p.x - c.x), s * (p.y - c.y)))
                .collect();
            let h = estimate_homography(plane, &conditioned)
                .ok_or(CalibratorError::DegenerateView { view })?;
            homographies.push(h);
        }

        let k_cond = intrinsics_from_homographies(&homographies, &self.options)?;
        Ok(t_inv * k_cond)
    }
}

fn validate(input: &CalibrationInput) -> Result<(), CalibratorError> {
    if input.views() < MIN_VIEWS {
        return Err(CalibratorError::NotEnoughViews {
            have: input.views(),
            need: MIN_VIEWS,
        });
    }
    if input.object_points.len() != input.image_points.len() {
        return Err(CalibratorError::DegenerateConfiguration(format!(
            "{} object point sets vs {} image point sets",
            input.object_points.len(),
            input.image_points.len()
        )));
    }
    for (view, (obj, img)) in input.object_points.iter().zip(&input.image_points).enumerate() {
        if obj.len() != img.len() {
            return Err(CalibratorError::LengthMismatch {
                view,
                image: img.len(),
                object: obj.len(),
            });
        }
        if obj.len() < MIN_POINTS {
            return Err(CalibratorError::NotEnoughPoints {
                view,
                have: obj.len(),
                need: MIN_POINTS,
            });
        }
        if obj.iter().any(|p| p.z.abs() > PLANE_EPS) {
            return Err(CalibratorError::NonPlanarTarget { view });
        }
    }
    Ok(())
}

/// `v_ij` row of Zhang's constraint matrix for homography columns `i`, `j`.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Solve `V b = 0` restricted to the parameterization the options allow.
///
/// `b = (B11, B12, B22, B13, B23, B33)`. Zero skew removes `B12`; a fixed
/// principal point (the conditioning origin) removes `B13` and `B23`; a
/// fixed aspect ratio ties `B11 = B22`.
fn intrinsics_from_homographies(
    homographies: &[Homography],
    options: &ZhangOptions,
) -> Result<Matrix3<f64>, CalibratorError> {
    let mut basis: Vec<SVector<f64, 6>> = Vec::with_capacity(5);
    let unit = |idx: &[usize]| {
        let mut v = SVector::<f64, 6>::zeros();
        for &i in idx {
            v[i] = 1.0;
        }
        v
    };
    if options.fix_aspect_ratio {
        basis.push(unit(&[0, 2]));
    } else {
        basis.push(unit(&[0]));
        basis.push(unit(&[2]));
    }
    if !options.fix_principal_point {
        basis.push(unit(&[3]));
        basis.push(unit(&[4]));
    }
    basis.push(unit(&[5]));

    let m = homographies.len();
    let p = basis.len();
    let mut a = DMatrix::<f64>::zeros((2 * m).max(p), p);
    for (k, h) in homographies.iter().enumerate() {
        let rows = [v_ij(&h.h, 0, 1), v_ij(&h.h, 0, 0) - v_ij(&h.h, 1, 1)];
        for (r, row) in rows.iter().enumerate() {
            for (c, b) in basis.iter().enumerate() {
                a[(2 * k + r, c)] = row.dot(b);
            }
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| {
        CalibratorError::DegenerateConfiguration("SVD did not converge".to_string())
    })?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| CalibratorError::DegenerateConfiguration("empty system".to_string()))?;
    let mut sorted: Vec<f64> = svd.singular_values.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.len() > 1 && sorted[1] < 1e-9 * sorted[sorted.len() - 1] {
        return Err(CalibratorError::DegenerateConfiguration(
            "views are too similar to constrain the intrinsics".to_string(),
        ));
    }
    let coeffs = v_t.row(min_idx);

    let mut b = SVector::<f64, 6>::zeros();
    for (c, basis_vec) in basis.iter().enumerate() {
        b += basis_vec * coeffs[c];
    }
    let (b11, b22, b13, b23, b33) = (b[0], b[2], b[3], b[4], b[5]);

    if b11.abs() < 1e-15 || b22.abs() < 1e-15 {
        return Err(CalibratorError::DegenerateConfiguration(
            "views do not constrain the focal lengths".to_string(),
        ));
    }
    let v0 = -b23 / b22;
    let lambda = b33 - (b13 * b13 - v0 * b11 * b23) / b11;
    let fx2 = lambda / b11;
    let fy2 = lambda / b22;
    if !(fx2 > 0.0 && fy2 > 0.0 && fx2.is_finite() && fy2.is_finite()) {
        return Err(CalibratorError::DegenerateConfiguration(format!(
            "no real focal length (lambda={lambda:.3e}, B11={b11:.3e}, B22={b22:.3e})"
        )));
    }
    let fx = fx2.sqrt();
    let fy = fy2.sqrt();
    let u0 = -b13 * fx2 / lambda;

    Ok(Matrix3::new(fx, 0.0, u0, 0.0, fy, v0, 0.0, 0.0, 1.0))
}

fn view_poses(
    k: &Matrix3<f64>,
    planes: &[Vec<Point2<f64>>],
    images: &[Vec<Point2<f64>>],
) -> Result<Vec<Isometry3<f64>>, CalibratorError> {
    planes
        .iter()
        .zip(images)
        .enumerate()
        .map(|(view, (plane, image))| {
            estimate_homography(plane, image)
                .and_then(|h| pose_from_homography(k, &h))
                .ok_or(CalibratorError::DegenerateView { view })
        })
        .collect()
}

/// Linear least squares for `k1`, `k2` against the observed pixels.
fn fit_radial(
    k: &Matrix3<f64>,
    poses: &[Isometry3<f64>],
    input: &CalibrationInput,
) -> Option<(f64, f64)> {
    let intr = CameraIntrinsics::from_matrix(k);
    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();

    for ((pose, obj), img) in poses.iter().zip(&input.object_points).zip(&input.image_points) {
        for (p, observed) in obj.iter().zip(img) {
            let pc = pose * p;
            if pc.z <= f64::EPSILON {
                continue;
            }
            let (x, y) = (pc.x / pc.z, pc.y / pc.z);
            let r2 = x * x + y * y;
            let ideal = intr.to_pixel(Point2::new(x, y));
            let du = ideal.x - intr.cx;
            let dv = ideal.y - intr.cy;

            for (row, rhs) in [
                (Vector2::new(du * r2, du * r2 * r2), observed.x - ideal.x),
                (Vector2::new(dv * r2, dv * r2 * r2), observed.y - ideal.y),
            ] {
                ata += row * row.transpose();
                atb += row * rhs;
            }
        }
    }

    let sol = ata.try_inverse()? * atb;
    (sol.x.is_finite() && sol.y.is_finite()).then_some((sol.x, sol.y))
}

fn rms_error(
    k: &Matrix3<f64>,
    dist: &[f64; DISTORTION_COEFFS],
    poses: &[Isometry3<f64>],
    input: &CalibrationInput,
) -> f64 {
    let intr = CameraIntrinsics::from_matrix(k);
    let mut sum = 0.0;
    let mut n = 0usize;
    for ((pose, obj), img) in poses.iter().zip(&input.object_points).zip(&input.image_points) {
        for (p, observed) in obj.iter().zip(img) {
            match project_point(pose, &intr, dist, p) {
                Some(q) => sum += (q - *observed).norm_squared(),
                None => return f64::INFINITY,
            }
            n += 1;
        }
    }
    if n == 0 {
        return f64::NAN;
    }
    (sum / n as f64).sqrt()
}
