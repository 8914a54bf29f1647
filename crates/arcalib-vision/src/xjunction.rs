//! ChESS X-junctions through `chess-corners`, adapted to the target
//! detectors' corner type.

use calib_targets::core::Corner;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use image::GrayImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// ChESS response settings shared by the chessboard and ChArUco detectors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessSettings {
    /// Response threshold relative to the strongest response in the image.
    pub threshold_rel: f32,
    pub nms_radius: u32,
}

impl Default for ChessSettings {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
        }
    }
}

impl ChessSettings {
    pub fn to_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel as _;
        cfg.params.nms_radius = self.nms_radius as _;
        cfg
    }
}

/// Raw ChESS corners of a grayscale image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, cfg), fields(width = img.width(), height = img.height()))
)]
pub(crate) fn detect_corners(img: &GrayImage, cfg: &ChessConfig) -> Vec<Corner> {
    find_chess_corners_image(img, cfg)
        .iter()
        .map(adapt_chess_corner)
        .collect()
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: c.orientation,
        orientation_cluster: None,
        strength: c.response,
    }
}
