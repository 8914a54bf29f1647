use std::path::{Path, PathBuf};

use arcalib_core::FrameSize;
use image::{GrayImage, RgbImage};

/// One captured frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Position in the stream, from zero.
    pub index: usize,
    pub image: RgbImage,
    /// File the frame was read from, when it came from disk.
    pub source: Option<PathBuf>,
}

impl Frame {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self {
            index,
            image,
            source: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    pub fn gray(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}
