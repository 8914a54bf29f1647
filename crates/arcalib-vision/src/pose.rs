//! Planar target pose from a homography, and the virtual objects drawn on
//! top of a calibrated view.

use arcalib_core::{
    estimate_homography, project_point, undistort_pixel, CameraIntrinsics, Homography,
    DISTORTION_COEFFS,
};
use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Decompose a plane-to-image homography into the target-to-camera pose.
///
/// The target lies on its own `z = 0` plane. The sign of `H` is chosen so
/// the target ends up in front of the camera. Returns `None` when `K` is
/// singular or `H` has no usable scale.
pub fn pose_from_homography(k: &Matrix3<f64>, h: &Homography) -> Option<Isometry3<f64>> {
    let k_inv = k.try_inverse()?;
    let h1 = k_inv * h.h.column(0);
    let h2 = k_inv * h.h.column(1);
    let h3 = k_inv * h.h.column(2);

    let norm = 0.5 * (h1.norm() + h2.norm());
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    // Nearest rotation in the Frobenius sense.
    let svd = r.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t: Vector3<f64> = h3 * lambda;
    Some(Isometry3::from_parts(
        Translation3::from(t),
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth)),
    ))
}

/// Pose of a planar target from one view, given a calibration.
///
/// Image points are undistorted first, so the homography is fitted in the
/// normalized image plane and decomposed with an identity `K`.
pub fn estimate_planar_pose(
    intrinsics: &CameraIntrinsics,
    dist: &[f64; DISTORTION_COEFFS],
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
) -> Option<Isometry3<f64>> {
    if object_points.len() != image_points.len() || object_points.len() < 4 {
        return None;
    }
    let plane: Vec<Point2<f64>> = object_points.iter().map(|p| Point2::new(p.x, p.y)).collect();
    let normalized: Vec<Point2<f64>> = image_points
        .iter()
        .map(|&p| undistort_pixel(p, intrinsics, dist))
        .collect();
    let h = estimate_homography(&plane, &normalized)?;
    pose_from_homography(&Matrix3::identity(), &h)
}

/// A 3D line segment in target coordinates.
pub type Segment = (Point3<f64>, Point3<f64>);

/// Square pyramid standing on the target plane, apex towards the camera.
///
/// `base` is the side length of the base square; the apex sits at
/// `z = -base` and a second square floats at `z = -2 * base`.
pub fn pyramid_segments(base: f64) -> Vec<Segment> {
    let square = |z: f64| {
        [
            Point3::new(0.0, 0.0, z),
            Point3::new(0.0, base, z),
            Point3::new(base, base, z),
            Point3::new(base, 0.0, z),
        ]
    };
    let bottom = square(0.0);
    let top = square(-2.0 * base);
    let apex = Point3::new(0.5 * base, 0.5 * base, -base);

    let mut segments = Vec::with_capacity(16);
    for i in 0..4 {
        let j = (i + 1) % 4;
        segments.push((bottom[i], bottom[j]));
        segments.push((bottom[i], apex));
        segments.push((top[i], top[j]));
        segments.push((top[i], apex));
    }
    segments
}

/// Target frame axes: x, y and z (towards the camera is `-z`).
pub fn axis_segments(length: f64) -> [Segment; 3] {
    let o = Point3::origin();
    [
        (o, Point3::new(length, 0.0, 0.0)),
        (o, Point3::new(0.0, length, 0.0)),
        (o, Point3::new(0.0, 0.0, -length)),
    ]
}

/// Project segments to pixels, dropping those with an endpoint behind the
/// camera.
pub fn project_segments(
    segments: &[Segment],
    pose: &Isometry3<f64>,
    intrinsics: &CameraIntrinsics,
    dist: &[f64; DISTORTION_COEFFS],
) -> Vec<(Point2<f64>, Point2<f64>)> {
    segments
        .iter()
        .filter_map(|(a, b)| {
            Some((
                project_point(pose, intrinsics, dist, a)?,
                project_point(pose, intrinsics, dist, b)?,
            ))
        })
        .collect()
}
