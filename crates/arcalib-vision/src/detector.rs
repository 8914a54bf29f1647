use std::path::PathBuf;

use arcalib_core::{Detection, JsonIoError};

use crate::Frame;

#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("failed to read detections from {}: {source}", path.display())]
    Sidecar {
        path: PathBuf,
        #[source]
        source: JsonIoError,
    },
    #[error("invalid detections in {}: {reason}", path.display())]
    InvalidSidecar { path: PathBuf, reason: String },
}

/// Turns a frame into target points for the sample gate.
///
/// An empty [`Detection`] means the target is not visible; errors are
/// reserved for broken inputs.
pub trait TargetDetector {
    fn name(&self) -> &'static str;

    fn detect(&self, frame: &Frame) -> Result<Detection, DetectError>;
}
