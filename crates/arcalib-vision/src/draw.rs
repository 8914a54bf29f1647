//! Frame annotation: detected points, Harris marks and projected overlays.

use arcalib_core::Detection;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use nalgebra::Point2;

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

const MARK_RADIUS: i32 = 5;

/// Two-pixel wide line.
fn thick_line(img: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, color: Rgb<u8>) {
    let (a, b) = ((a.x as f32, a.y as f32), (b.x as f32, b.y as f32));
    for (ox, oy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
        draw_line_segment_mut(img, (a.0 + ox, a.1 + oy), (b.0 + ox, b.1 + oy), color);
    }
}

fn ring(img: &mut RgbImage, p: Point2<f64>, color: Rgb<u8>) {
    let c = (p.x.round() as i32, p.y.round() as i32);
    draw_hollow_circle_mut(img, c, MARK_RADIUS, color);
    draw_hollow_circle_mut(img, c, MARK_RADIUS + 1, color);
}

/// Circle every detected point and join consecutive ones, so the row-major
/// order is visible. The first point also gets a cross.
pub fn draw_detection(img: &mut RgbImage, detection: &Detection) {
    for pair in detection.image_points.windows(2) {
        draw_line_segment_mut(
            img,
            (pair[0].x as f32, pair[0].y as f32),
            (pair[1].x as f32, pair[1].y as f32),
            YELLOW,
        );
    }
    for &p in &detection.image_points {
        ring(img, p, GREEN);
    }
    if let Some(first) = detection.image_points.first() {
        draw_cross_mut(img, RED, first.x.round() as i32, first.y.round() as i32);
    }
}

/// Red circles on Harris corner pixels.
pub fn draw_corners(img: &mut RgbImage, corners: &[Point2<f64>]) {
    for &p in corners {
        ring(img, p, RED);
    }
}

pub fn draw_segments(img: &mut RgbImage, segments: &[(Point2<f64>, Point2<f64>)], color: Rgb<u8>) {
    for &(a, b) in segments {
        thick_line(img, a, b, color);
    }
}

/// Projected target axes in x, y, z order, drawn red, green and blue.
pub fn draw_axes(img: &mut RgbImage, axes: &[(Point2<f64>, Point2<f64>)]) {
    for (&(a, b), color) in axes.iter().zip([RED, GREEN, BLUE]) {
        thick_line(img, a, b, color);
    }
}
