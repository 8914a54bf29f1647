//! Harris corner response.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParams {
    /// Side of the window the structure tensor is summed over.
    pub block_size: u32,
    /// Harris free parameter in `det(M) - k * trace(M)^2`.
    pub k: f64,
    /// Corners are pixels whose normalized response exceeds this.
    pub threshold: u8,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            block_size: 2,
            k: 0.04,
            threshold: 225,
        }
    }
}

pub type ResponseImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Raw Harris response from 3x3 Sobel gradients.
///
/// The summation window is centred on each pixel; even block sizes lean
/// towards the top-left.
pub fn harris_response(gray: &GrayImage, params: &HarrisParams) -> ResponseImage {
    let (w, h) = gray.dimensions();
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    let block = params.block_size.max(1) as i64;
    let lo = (block - 1) / 2 + (block + 1) % 2;
    let hi = block - 1 - lo;

    let clamp = |v: i64, max: u32| v.clamp(0, max as i64 - 1) as u32;
    ResponseImage::from_fn(w, h, |x, y| {
        let (mut sxx, mut syy, mut sxy) = (0.0f64, 0.0f64, 0.0f64);
        for dy in -lo..=hi {
            for dx in -lo..=hi {
                let px = clamp(x as i64 + dx, w);
                let py = clamp(y as i64 + dy, h);
                let ix = gx.get_pixel(px, py)[0] as f64;
                let iy = gy.get_pixel(px, py)[0] as f64;
                sxx += ix * ix;
                syy += iy * iy;
                sxy += ix * iy;
            }
        }
        let det = sxx * syy - sxy * sxy;
        let trace = sxx + syy;
        Luma([(det - params.k * trace * trace) as f32])
    })
}

/// Min-max normalize to `0..=255`. A flat response maps to zero.
pub fn normalize_response(response: &ResponseImage) -> GrayImage {
    let (min, max) = response
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p[0]), hi.max(p[0]))
        });
    let range = max - min;
    GrayImage::from_fn(response.width(), response.height(), |x, y| {
        if !range.is_finite() || range <= 0.0 {
            return Luma([0]);
        }
        let v = (response.get_pixel(x, y)[0] - min) / range * 255.0;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Pixels whose normalized response exceeds `params.threshold`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(gray, params), fields(width = gray.width(), height = gray.height()))
)]
pub fn harris_corners(gray: &GrayImage, params: &HarrisParams) -> Vec<Point2<f64>> {
    let normalized = normalize_response(&harris_response(gray, params));
    normalized
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > params.threshold)
        .map(|(x, y, _)| Point2::new(x as f64, y as f64))
        .collect()
}
