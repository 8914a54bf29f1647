//! Synthetic camera views of a planar target.
//!
//! Used by tests and by tooling that needs detections with known ground
//! truth. Poses are deterministic so results are reproducible.

use arcalib_core::{project_point, CameraIntrinsics, ChessboardSpec, FrameSize, TargetLayout, DISTORTION_COEFFS};
use arcalib_session::CalibrationInput;
use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticCamera {
    pub intrinsics: CameraIntrinsics,
    pub dist: [f64; DISTORTION_COEFFS],
    pub frame_size: FrameSize,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self {
            intrinsics: CameraIntrinsics {
                fx: 800.0,
                fy: 800.0,
                cx: 319.5,
                cy: 239.5,
            },
            dist: [0.0; DISTORTION_COEFFS],
            frame_size: FrameSize::new(640, 480),
        }
    }
}

// (roll, pitch, yaw) in radians; cycled through by `board_pose`.
const TILTS: [(f64, f64, f64); 8] = [
    (0.25, 0.0, 0.05),
    (-0.25, 0.1, -0.05),
    (0.0, 0.3, 0.1),
    (0.1, -0.3, 0.0),
    (-0.15, -0.2, 0.15),
    (0.3, 0.25, -0.1),
    (-0.3, 0.05, 0.2),
    (0.05, -0.1, -0.2),
];

/// The `i`-th deterministic pose of a target whose centre is `center`.
///
/// The target centre lands on the optical axis at 450..525 units.
pub fn board_pose(i: usize, center: Point3<f64>) -> Isometry3<f64> {
    let (roll, pitch, yaw) = TILTS[i % TILTS.len()];
    let spin = 0.05 * (i / TILTS.len()) as f64;
    let rot = UnitQuaternion::from_euler_angles(roll, pitch, yaw + spin);
    let depth = 450.0 + 25.0 * (i % 4) as f64;
    let t = Vector3::new(0.0, 0.0, depth) - rot * center.coords;
    Isometry3::from_parts(Translation3::from(t), rot)
}

/// Project every layout point; `None` if any point falls behind the camera.
pub fn project_layout(
    camera: &SyntheticCamera,
    layout: &TargetLayout,
    pose: &Isometry3<f64>,
) -> Option<Vec<Point2<f64>>> {
    layout
        .points()
        .iter()
        .map(|p| project_point(pose, &camera.intrinsics, &camera.dist, p))
        .collect()
}

fn layout_center(layout: &TargetLayout) -> Point3<f64> {
    let n = layout.len().max(1) as f64;
    let sum = layout
        .points()
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / n)
}

/// `views` calibration samples of a `cols x rows` chessboard.
pub fn synthetic_views(
    camera: &SyntheticCamera,
    cols: u32,
    rows: u32,
    square_size: f64,
    views: usize,
) -> CalibrationInput {
    let spec = ChessboardSpec {
        cols,
        rows,
        square_size,
    };
    let layout = TargetLayout::from_chessboard(&spec).unwrap_or_else(|_| TargetLayout::from_points(Vec::new()));
    let center = layout_center(&layout);

    let mut object_points = Vec::with_capacity(views);
    let mut image_points = Vec::with_capacity(views);
    for i in 0..views {
        let pose = board_pose(i, center);
        if let Some(pixels) = project_layout(camera, &layout, &pose) {
            object_points.push(layout.points().to_vec());
            image_points.push(pixels);
        }
    }

    CalibrationInput {
        frame_size: camera.frame_size,
        object_points,
        image_points,
    }
}

/// Pose sequence for a layout, as used by [`synthetic_views`].
pub fn layout_poses(layout: &TargetLayout, views: usize) -> Vec<Isometry3<f64>> {
    let center = layout_center(layout);
    (0..views).map(|i| board_pose(i, center)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_stay_inside_the_frame() {
        let cam = SyntheticCamera::default();
        let input = synthetic_views(&cam, 9, 6, 25.0, 8);
        assert_eq!(input.views(), 8);
        for view in &input.image_points {
            assert_eq!(view.len(), 54);
            for p in view {
                assert!(p.x > 0.0 && p.x < 640.0, "x = {}", p.x);
                assert!(p.y > 0.0 && p.y < 480.0, "y = {}", p.y);
            }
        }
    }

    #[test]
    fn center_lands_on_optical_axis() {
        let center = Point3::new(100.0, 62.5, 0.0);
        let pose = board_pose(3, center);
        let c = pose * center;
        assert!(c.x.abs() < 1e-9 && c.y.abs() < 1e-9);
        assert!((c.z - 525.0).abs() < 1e-9);
    }
}
