//! Printable chessboard and ChArUco board images.

use std::path::Path;

use arcalib_core::ChessboardSpec;
use calib_targets::aruco::Dictionary;
use image::{GrayImage, Luma};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::marker::{marker_code, paint_marker, MarkerError};

/// Pixel geometry of a rendered board.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardRender {
    pub square_px: u32,
    pub margin_px: u32,
}

impl Default for BoardRender {
    fn default() -> Self {
        Self {
            square_px: 80,
            margin_px: 40,
        }
    }
}

impl BoardRender {
    /// Image size for a board with `cols x rows` inner corners.
    pub fn image_size(&self, spec: &ChessboardSpec) -> (u32, u32) {
        (
            (spec.cols + 1) * self.square_px + 2 * self.margin_px,
            (spec.rows + 1) * self.square_px + 2 * self.margin_px,
        )
    }

    /// Render `(cols + 1) x (rows + 1)` squares on a white margin. The
    /// top-left square is black.
    pub fn render(&self, spec: &ChessboardSpec) -> GrayImage {
        let (w, h) = self.image_size(spec);
        let sq = self.square_px.max(1);
        let m = self.margin_px;
        let board_w = (spec.cols + 1) * sq;
        let board_h = (spec.rows + 1) * sq;

        GrayImage::from_fn(w, h, |x, y| {
            if x < m || y < m || x >= m + board_w || y >= m + board_h {
                return Luma([255]);
            }
            let (i, j) = ((x - m) / sq, (y - m) / sq);
            if (i + j) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    /// The chessboard with a marker centred in every white square.
    ///
    /// Marker ids run row-major over the white squares from 0, the OpenCV
    /// ChArUco layout. `marker_size_rel` is the marker side over the square
    /// side.
    pub fn render_charuco(
        &self,
        spec: &ChessboardSpec,
        dict: &Dictionary,
        marker_size_rel: f32,
    ) -> Result<GrayImage, MarkerError> {
        let mut img = self.render(spec);
        let sq = self.square_px.max(1);
        let side = ((sq as f32 * marker_size_rel).round() as u32).clamp(1, sq);
        let inset = (sq - side) / 2;
        let mut id = 0;
        for j in 0..=spec.rows {
            for i in 0..=spec.cols {
                if (i + j) % 2 == 0 {
                    continue;
                }
                let code = marker_code(dict, id)?;
                let origin = (
                    self.margin_px + i * sq + inset,
                    self.margin_px + j * sq + inset,
                );
                paint_marker(&mut img, origin, side, code, dict.marker_size, 1);
                id += 1;
            }
        }
        Ok(img)
    }

    /// Inner corners of the rendered board in pixel-centre coordinates,
    /// row-major, matching `TargetLayout::from_chessboard`.
    pub fn inner_corners(&self, spec: &ChessboardSpec) -> Vec<Point2<f64>> {
        let sq = self.square_px as f64;
        let m = self.margin_px as f64;
        (1..=spec.rows)
            .flat_map(|r| {
                (1..=spec.cols)
                    .map(move |c| Point2::new(m + c as f64 * sq - 0.5, m + r as f64 * sq - 0.5))
            })
            .collect()
    }

    /// Render and save as PNG.
    pub fn save_png(&self, spec: &ChessboardSpec, path: impl AsRef<Path>) -> image::ImageResult<()> {
        save_gray(&self.render(spec), path.as_ref())
    }

    /// Render the ChArUco board and save as PNG.
    pub fn save_charuco_png(
        &self,
        spec: &ChessboardSpec,
        dict: &Dictionary,
        marker_size_rel: f32,
        path: impl AsRef<Path>,
    ) -> Result<(), MarkerError> {
        let img = self.render_charuco(spec, dict, marker_size_rel)?;
        save_gray(&img, path.as_ref())?;
        Ok(())
    }
}

pub(crate) fn save_gray(img: &GrayImage, path: &Path) -> image::ImageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    img.save_with_format(path, image::ImageFormat::Png)
}
