//! ChArUco board detection: markers decoded in the white squares give every
//! chessboard corner its id, so partly visible or rotated boards still map
//! onto the layout.

use arcalib_core::{ChessboardSpec, Detection};
use calib_targets::charuco::{
    CharucoBoard, CharucoBoardSpec, CharucoDetectorParams, MarkerLayout,
};
use calib_targets::detect::detect_charuco;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::marker::{dictionary, MarkerError, DEFAULT_DICTIONARY};
use crate::xjunction::ChessSettings;
use crate::{DetectError, Frame, TargetDetector};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharucoParams {
    pub dictionary: String,
    /// Marker side over square side.
    pub marker_size_rel: f32,
    pub chess: ChessSettings,
}

impl Default for CharucoParams {
    fn default() -> Self {
        Self {
            dictionary: DEFAULT_DICTIONARY.to_string(),
            marker_size_rel: 0.75,
            chess: ChessSettings::default(),
        }
    }
}

/// Detects a ChArUco board whose inner corners form `board`.
///
/// Corner ids are row-major over the inner corners, the same indexing as
/// `TargetLayout::from_chessboard`.
#[derive(Clone, Debug)]
pub struct CharucoBoardDetector {
    board: ChessboardSpec,
    spec: CharucoBoardSpec,
    detector: CharucoDetectorParams,
    chess: ChessSettings,
}

impl CharucoBoardDetector {
    /// Fails on an unknown dictionary or one too small for the board.
    pub fn new(board: ChessboardSpec, params: &CharucoParams) -> Result<Self, MarkerError> {
        let spec = CharucoBoardSpec {
            rows: board.rows + 1,
            cols: board.cols + 1,
            cell_size: board.square_size as f32,
            marker_size_rel: params.marker_size_rel,
            dictionary: dictionary(&params.dictionary)?,
            marker_layout: MarkerLayout::OpenCvCharuco,
        };
        CharucoBoard::new(spec)?;
        Ok(Self {
            board,
            spec,
            detector: CharucoDetectorParams::for_board(&spec),
            chess: params.chess,
        })
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, gray), fields(width = gray.width(), height = gray.height()))
    )]
    pub fn detect_gray(&self, gray: &image::GrayImage) -> Detection {
        let found = match detect_charuco(
            gray,
            &self.chess.to_config(),
            self.spec,
            self.detector.clone(),
        ) {
            Ok(found) => found,
            Err(e) => {
                log::debug!("charuco: {e}");
                return Detection::default();
            }
        };

        let count = self.board.corner_count() as u32;
        let (points, ids): (Vec<Point2<f64>>, Vec<u32>) = found
            .detection
            .corners
            .iter()
            .filter_map(|c| {
                let id = c.id.filter(|&id| id < count)?;
                Some((
                    Point2::new(f64::from(c.position.x), f64::from(c.position.y)),
                    id,
                ))
            })
            .unzip();
        log::debug!(
            "charuco: {} of {} corners, {} markers",
            ids.len(),
            count,
            found.markers.len()
        );
        Detection::with_ids(points, ids)
    }
}

impl TargetDetector for CharucoBoardDetector {
    fn name(&self) -> &'static str {
        "charuco"
    }

    fn detect(&self, frame: &Frame) -> Result<Detection, DetectError> {
        Ok(self.detect_gray(&frame.gray()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BoardRender;
    use image::{GrayImage, Luma};
    use imageproc::filter::gaussian_blur_f32;
    use std::collections::HashSet;

    fn board() -> ChessboardSpec {
        ChessboardSpec::default()
    }

    #[test]
    fn rendered_board_corners_get_layout_ids() {
        let params = CharucoParams::default();
        let det = CharucoBoardDetector::new(board(), &params).expect("detector");
        let render = BoardRender {
            square_px: 60,
            margin_px: 60,
        };
        let dict = dictionary(&params.dictionary).expect("dict");
        let img = render
            .render_charuco(&board(), &dict, params.marker_size_rel)
            .expect("render");
        let found = det.detect_gray(&gaussian_blur_f32(&img, 0.8));

        let ids = found.ids.clone().expect("ids");
        assert!(ids.len() >= 40, "{} corners", ids.len());
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        let truth = render.inner_corners(&board());
        for (p, &id) in found.image_points.iter().zip(&ids) {
            let t = truth[id as usize];
            assert!((p - t).norm() < 1.5, "id {id}: {p:?} vs {t:?}");
        }
    }

    #[test]
    fn plain_image_has_no_corners() {
        let det = CharucoBoardDetector::new(board(), &CharucoParams::default()).expect("detector");
        let img = GrayImage::from_pixel(320, 240, Luma([180]));
        assert!(det.detect_gray(&img).is_empty());
    }

    #[test]
    fn dictionary_must_cover_the_board() {
        let params = CharucoParams {
            dictionary: "DICT_4X4_50".into(),
            ..CharucoParams::default()
        };
        let big = ChessboardSpec {
            cols: 12,
            rows: 9,
            square_size: 20.0,
        };
        assert!(matches!(
            CharucoBoardDetector::new(big, &params),
            Err(MarkerError::Board(_))
        ));
        let unknown = CharucoParams {
            dictionary: "DICT_0X0".into(),
            ..CharucoParams::default()
        };
        assert!(matches!(
            CharucoBoardDetector::new(board(), &unknown),
            Err(MarkerError::UnknownDictionary(_))
        ));
    }
}
