//! Pinhole camera with Brown-Conrady distortion.
//!
//! Distortion coefficients follow the OpenCV order `[k1, k2, p1, p2, k3]`.

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Number of stored distortion coefficients.
pub const DISTORTION_COEFFS: usize = 5;

const UNDISTORT_ITERS: usize = 8;

/// Frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (self.width as f64 - 1.0) * 0.5,
            (self.height as f64 - 1.0) * 0.5,
        )
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Zero-skew intrinsics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub fn to_pixel(&self, n: Point2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    #[inline]
    pub fn to_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }
}

/// Apply distortion to a point on the normalized image plane.
pub fn distort_normalized(n: Point2<f64>, dist: &[f64; DISTORTION_COEFFS]) -> Point2<f64> {
    let [k1, k2, p1, p2, k3] = *dist;
    let (x, y) = (n.x, n.y);
    let r2 = x * x + y * y;
    let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
    Point2::new(
        x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
        y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
    )
}

/// Invert [`distort_normalized`] by fixed-point iteration and return the
/// undistorted normalized coordinates of a pixel.
pub fn undistort_pixel(
    p: Point2<f64>,
    intr: &CameraIntrinsics,
    dist: &[f64; DISTORTION_COEFFS],
) -> Point2<f64> {
    let target = intr.to_normalized(p);
    let mut n = target;
    for _ in 0..UNDISTORT_ITERS {
        let d = distort_normalized(n, dist);
        n = Point2::new(n.x + (target.x - d.x), n.y + (target.y - d.y));
    }
    n
}

/// Project a point given in the target frame into pixels.
///
/// Returns `None` for points at or behind the camera plane.
pub fn project_point(
    pose: &Isometry3<f64>,
    intr: &CameraIntrinsics,
    dist: &[f64; DISTORTION_COEFFS],
    p: &Point3<f64>,
) -> Option<Point2<f64>> {
    let pc = pose * p;
    if pc.z <= f64::EPSILON {
        return None;
    }
    let n = Point2::new(pc.x / pc.z, pc.y / pc.z);
    Some(intr.to_pixel(distort_normalized(n, dist)))
}

/// Axis-angle (Rodrigues) vector of a rotation.
pub fn rodrigues_from_rotation(rot: &UnitQuaternion<f64>) -> [f64; 3] {
    let v = rot.scaled_axis();
    [v.x, v.y, v.z]
}

/// Build a target-to-camera pose from Rodrigues rotation and translation.
pub fn pose_from_rodrigues(rvec: &[f64; 3], tvec: &[f64; 3]) -> Isometry3<f64> {
    let rot = Rotation3::new(Vector3::new(rvec[0], rvec[1], rvec[2]));
    Isometry3::from_parts(
        Translation3::new(tvec[0], tvec[1], tvec[2]),
        UnitQuaternion::from_rotation_matrix(&rot),
    )
}
