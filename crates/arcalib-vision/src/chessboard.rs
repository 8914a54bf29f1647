//! Full-board chessboard detection.
//!
//! ChESS corners go through the `calib-targets` grid detector, which labels
//! every corner it links with integer grid coordinates. Those labels are
//! mapped onto the `cols x rows` layout; the board is reported only when
//! every corner is present, as partial boards would not match the session
//! layout.

use std::collections::HashMap;

use arcalib_core::{ChessboardSpec, Detection};
use calib_targets::chessboard::ChessboardDetector as GridDetector;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::xjunction::{detect_corners, ChessSettings};
use crate::{DetectError, Frame, TargetDetector};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessboardParams {
    pub chess: ChessSettings,
    /// Share of the grid the detector must link before a component is
    /// considered at all.
    pub completeness_threshold: f32,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            chess: ChessSettings::default(),
            completeness_threshold: 0.9,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChessboardDetector {
    pub board: ChessboardSpec,
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(board: ChessboardSpec, params: ChessboardParams) -> Self {
        Self { board, params }
    }

    fn grid_params(&self) -> calib_targets::ChessboardParams {
        calib_targets::ChessboardParams {
            expected_rows: Some(self.board.rows),
            expected_cols: Some(self.board.cols),
            completeness_threshold: self.params.completeness_threshold,
            ..calib_targets::ChessboardParams::default()
        }
    }

    /// Detect on a grayscale image. An empty detection means the full board
    /// was not found.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, gray), fields(width = gray.width(), height = gray.height()))
    )]
    pub fn detect_gray(&self, gray: &image::GrayImage) -> Detection {
        let corners = detect_corners(gray, &self.params.chess.to_config());
        let Some(found) = GridDetector::new(self.grid_params()).detect_from_corners(&corners)
        else {
            log::debug!("chessboard: no grid among {} corners", corners.len());
            return Detection::default();
        };

        let labelled: Vec<((i32, i32), Point2<f64>)> = found
            .detection
            .corners
            .iter()
            .filter_map(|c| {
                let g = c.grid?;
                Some((
                    (g.i, g.j),
                    Point2::new(f64::from(c.position.x), f64::from(c.position.y)),
                ))
            })
            .collect();
        match order_grid(&labelled, self.board.cols as usize, self.board.rows as usize) {
            Some(points) => Detection::ordered(points),
            None => {
                log::debug!(
                    "chessboard: grid of {} corners is not a full {}x{} board",
                    labelled.len(),
                    self.board.cols,
                    self.board.rows
                );
                Detection::default()
            }
        }
    }
}

impl TargetDetector for ChessboardDetector {
    fn name(&self) -> &'static str {
        "chessboard"
    }

    fn detect(&self, frame: &Frame) -> Result<Detection, DetectError> {
        Ok(self.detect_gray(&frame.gray()))
    }
}

/// Arrange grid-labelled corners into the layout's row-major order.
///
/// Grid labels carry no handedness or origin, so every symmetry of the grid
/// that fits `cols x rows` is tried. Mirrored candidates are dropped (layout
/// x to image right must turn clockwise into layout y, as image y points
/// down), and among the rest the one whose first row runs most nearly along
/// image +x wins. This keeps the order stable across frames for any in-plane
/// rotation.
pub(crate) fn order_grid(
    labelled: &[((i32, i32), Point2<f64>)],
    cols: usize,
    rows: usize,
) -> Option<Vec<Point2<f64>>> {
    if cols < 2 || rows < 2 || labelled.len() != cols * rows {
        return None;
    }
    let min_i = labelled.iter().map(|((i, _), _)| *i).min()?;
    let min_j = labelled.iter().map(|((_, j), _)| *j).min()?;
    let cells: HashMap<(usize, usize), Point2<f64>> = labelled
        .iter()
        .map(|&((i, j), p)| (((i - min_i) as usize, (j - min_j) as usize), p))
        .collect();
    if cells.len() != labelled.len() {
        return None;
    }

    let (c1, r1) = (cols - 1, rows - 1);
    let symmetries: [&dyn Fn(usize, usize) -> (usize, usize); 8] = [
        &|c, r| (c, r),
        &|c, r| (c1 - c, r),
        &|c, r| (c, r1 - r),
        &|c, r| (c1 - c, r1 - r),
        &|c, r| (r, c),
        &|c, r| (r1 - r, c),
        &|c, r| (r, c1 - c),
        &|c, r| (r1 - r, c1 - c),
    ];

    symmetries
        .iter()
        .filter_map(|map| {
            (0..rows)
                .flat_map(|r| (0..cols).map(move |c| (c, r)))
                .map(|(c, r)| cells.get(&map(c, r)).copied())
                .collect::<Option<Vec<_>>>()
        })
        .filter(|pts| {
            let (x, y) = (pts[1] - pts[0], pts[cols] - pts[0]);
            x.x * y.y - x.y * y.x > 0.0
        })
        .max_by(|a, b| {
            let (da, db) = (a[cols - 1] - a[0], b[cols - 1] - b[0]);
            da.x.total_cmp(&db.x).then(da.y.total_cmp(&db.y))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BoardRender;
    use image::{GrayImage, Luma};
    use imageproc::filter::gaussian_blur_f32;
    use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

    fn detector(cols: u32, rows: u32) -> ChessboardDetector {
        ChessboardDetector::new(
            ChessboardSpec {
                cols,
                rows,
                square_size: 25.0,
            },
            ChessboardParams::default(),
        )
    }

    fn board_image(det: &ChessboardDetector, render: &BoardRender) -> GrayImage {
        gaussian_blur_f32(&render.render(&det.board), 0.8)
    }

    /// Row neighbours are one square apart and rows turn clockwise.
    fn assert_consistent_grid(points: &[Point2<f64>], cols: usize, square_px: f64) {
        for (k, p) in points.iter().enumerate() {
            if (k + 1) % cols != 0 {
                let step = (points[k + 1] - p).norm();
                assert!((step - square_px).abs() < 2.0, "step {step} at {k}");
            }
        }
        let (x, y) = (points[1] - points[0], points[cols] - points[0]);
        assert!(x.x * y.y - x.y * y.x > 0.0);
    }

    #[test]
    fn finds_rendered_board_in_row_major_order() {
        let det = detector(9, 6);
        let render = BoardRender {
            square_px: 30,
            margin_px: 30,
        };
        let found = det.detect_gray(&board_image(&det, &render));
        let truth = render.inner_corners(&det.board);
        assert_eq!(found.len(), 54);
        for (p, t) in found.image_points.iter().zip(&truth) {
            assert!((p - t).norm() < 1.0, "{p:?} vs {t:?}");
        }
    }

    #[test]
    fn diagonal_board_is_found() {
        let det = detector(9, 6);
        let render = BoardRender {
            square_px: 30,
            margin_px: 80,
        };
        let upright = board_image(&det, &render);
        for degrees in [30.0_f32, 45.0, 135.0] {
            let turned = rotate_about_center(
                &upright,
                degrees.to_radians(),
                Interpolation::Bilinear,
                Luma([255]),
            );
            let found = det.detect_gray(&turned);
            assert_eq!(found.len(), 54, "{degrees} degrees");
            assert_consistent_grid(&found.image_points, 9, 30.0);
            // The first row runs rightwards.
            let row = found.image_points[8] - found.image_points[0];
            assert!(row.x > 0.0, "{degrees} degrees: {row:?}");
        }
    }

    #[test]
    fn blank_frame_gives_empty_detection() {
        let det = detector(9, 6);
        let img = GrayImage::from_pixel(320, 240, Luma([200]));
        assert!(det.detect_gray(&img).is_empty());
    }

    #[test]
    fn wrong_board_size_is_not_reported() {
        let render = BoardRender {
            square_px: 30,
            margin_px: 30,
        };
        let small = detector(5, 4);
        assert!(detector(9, 6)
            .detect_gray(&board_image(&small, &render))
            .is_empty());
    }

    #[test]
    fn quarter_turned_grid_keeps_handedness() {
        // 3x2 board turned by 90 degrees: its rows run down the image and
        // the grid labels arrive transposed.
        let labelled = vec![
            ((0, 0), Point2::new(100.0, 100.0)),
            ((0, 1), Point2::new(100.0, 120.0)),
            ((0, 2), Point2::new(100.0, 140.0)),
            ((1, 0), Point2::new(80.0, 100.0)),
            ((1, 1), Point2::new(80.0, 120.0)),
            ((1, 2), Point2::new(80.0, 140.0)),
        ];
        let ordered = order_grid(&labelled, 3, 2).expect("ordered");
        assert_eq!(ordered.len(), 6);
        assert_consistent_grid(&ordered, 3, 20.0);
    }

    #[test]
    fn incomplete_or_duplicated_labels_are_rejected() {
        let mut labelled: Vec<((i32, i32), Point2<f64>)> = (0..2)
            .flat_map(|j| (0..3).map(move |i| ((i, j), Point2::new(i as f64, j as f64))))
            .collect();
        assert!(order_grid(&labelled[..5], 3, 2).is_none());
        labelled[5].0 = (0, 0);
        assert!(order_grid(&labelled, 3, 2).is_none());
    }
}
