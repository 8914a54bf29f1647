//! Printable ArUco markers from the embedded dictionaries.

use std::path::Path;

use calib_targets::aruco::{builtins, Dictionary};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::render::save_gray;

pub const DEFAULT_DICTIONARY: &str = "DICT_6X6_250";

#[derive(thiserror::Error, Debug)]
pub enum MarkerError {
    #[error("unknown marker dictionary {0}")]
    UnknownDictionary(String),
    #[error("marker id {id} is outside {dictionary} ({count} markers)")]
    UnknownId {
        id: u32,
        dictionary: &'static str,
        count: usize,
    },
    #[error("{side_px} px is too small for a {cells}-cell marker")]
    TooSmall { side_px: u32, cells: u32 },
    #[error(transparent)]
    Board(#[from] calib_targets::charuco::CharucoBoardError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Look up one of the embedded dictionaries by its OpenCV name.
pub fn dictionary(name: &str) -> Result<Dictionary, MarkerError> {
    builtins::builtin_dictionary(name).ok_or_else(|| MarkerError::UnknownDictionary(name.to_string()))
}

/// Square marker image geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerRender {
    pub dictionary: String,
    pub side_px: u32,
    /// Black cells around the code bits.
    pub border_bits: u32,
}

impl Default for MarkerRender {
    fn default() -> Self {
        Self {
            dictionary: DEFAULT_DICTIONARY.to_string(),
            side_px: 200,
            border_bits: 1,
        }
    }
}

impl MarkerRender {
    pub fn render(&self, id: u32) -> Result<GrayImage, MarkerError> {
        let dict = dictionary(&self.dictionary)?;
        let code = marker_code(&dict, id)?;
        let cells = dict.marker_size as u32 + 2 * self.border_bits;
        if self.side_px < cells {
            return Err(MarkerError::TooSmall {
                side_px: self.side_px,
                cells,
            });
        }
        let mut img = GrayImage::from_pixel(self.side_px, self.side_px, Luma([255]));
        paint_marker(
            &mut img,
            (0, 0),
            self.side_px,
            code,
            dict.marker_size,
            self.border_bits as usize,
        );
        Ok(img)
    }

    pub fn save_png(&self, id: u32, path: impl AsRef<Path>) -> Result<(), MarkerError> {
        save_gray(&self.render(id)?, path.as_ref())?;
        Ok(())
    }
}

pub(crate) fn marker_code(dict: &Dictionary, id: u32) -> Result<u64, MarkerError> {
    dict.codes
        .get(id as usize)
        .copied()
        .ok_or(MarkerError::UnknownId {
            id,
            dictionary: dict.name,
            count: dict.codes.len(),
        })
}

/// Paint a marker into the `side x side` square at `origin`.
///
/// Code bits are row-major with bit `y * bits + x` set for a black cell;
/// border cells are black. Cell edges are spread over the side so any pixel
/// size works.
pub(crate) fn paint_marker(
    img: &mut GrayImage,
    origin: (u32, u32),
    side: u32,
    code: u64,
    bits: usize,
    border: usize,
) {
    let cells = (bits + 2 * border) as u64;
    let side64 = u64::from(side.max(1));
    for dy in 0..side {
        let cy = (u64::from(dy) * cells / side64) as usize;
        for dx in 0..side {
            let cx = (u64::from(dx) * cells / side64) as usize;
            let inside = cx >= border && cy >= border && cx < border + bits && cy < border + bits;
            let black = !inside || (code >> ((cy - border) * bits + (cx - border))) & 1 == 1;
            let (x, y) = (origin.0 + dx, origin.1 + dy);
            if x < img.width() && y < img.height() {
                img.put_pixel(x, y, Luma([if black { 0 } else { 255 }]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_targets::aruco::Matcher;
    use tempfile::tempdir;

    /// Read the code bits back from cell centres.
    fn read_code(img: &GrayImage, bits: usize, border: usize) -> (u64, bool) {
        let cells = bits + 2 * border;
        let cell_px = img.width() as f64 / cells as f64;
        let mut code = 0u64;
        let mut border_black = true;
        for cy in 0..cells {
            for cx in 0..cells {
                let x = ((cx as f64 + 0.5) * cell_px) as u32;
                let y = ((cy as f64 + 0.5) * cell_px) as u32;
                let black = img.get_pixel(x, y)[0] < 128;
                if cx < border || cy < border || cx >= border + bits || cy >= border + bits {
                    border_black &= black;
                } else if black {
                    code |= 1 << ((cy - border) * bits + (cx - border));
                }
            }
        }
        (code, border_black)
    }

    #[test]
    fn default_marker_png_decodes_to_its_id() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("aruco_marker_23.png");
        let render = MarkerRender::default();
        render.save_png(23, &path).expect("save");

        let img = image::open(&path).expect("png").to_luma8();
        assert_eq!(img.dimensions(), (200, 200));
        let dict = dictionary(DEFAULT_DICTIONARY).expect("dictionary");
        assert_eq!(dict.marker_size, 6);
        let (code, border_black) = read_code(&img, 6, 1);
        assert!(border_black);
        assert_eq!(code, dict.codes[23]);

        let found = Matcher::new(dict, 0).match_code(code).expect("match");
        assert_eq!((found.id, found.rotation, found.hamming), (23, 0, 0));
    }

    #[test]
    fn odd_sizes_still_decode() {
        let render = MarkerRender {
            side_px: 157,
            border_bits: 2,
            ..MarkerRender::default()
        };
        let img = render.render(7).expect("render");
        let (code, border_black) = read_code(&img, 6, 2);
        assert!(border_black);
        assert_eq!(code, dictionary(DEFAULT_DICTIONARY).expect("dict").codes[7]);
    }

    #[test]
    fn rejects_unknown_ids_and_dictionaries() {
        assert!(matches!(
            MarkerRender::default().render(250),
            Err(MarkerError::UnknownId { id: 250, .. })
        ));
        let render = MarkerRender {
            dictionary: "DICT_9X9_1".into(),
            ..MarkerRender::default()
        };
        assert!(matches!(
            render.render(0),
            Err(MarkerError::UnknownDictionary(_))
        ));
        let tiny = MarkerRender {
            side_px: 4,
            ..MarkerRender::default()
        };
        assert!(matches!(tiny.render(0), Err(MarkerError::TooSmall { .. })));
    }
}
