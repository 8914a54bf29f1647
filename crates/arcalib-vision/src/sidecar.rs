//! Marker detections supplied next to each frame as JSON.
//!
//! Marker decoding is left to an external detector; it writes one
//! `<frame-stem>.json` per frame:
//!
//! ```json
//! { "corners": [ { "id": 0, "x": 101.5, "y": 87.25 }, ... ] }
//! ```
//!
//! Ids index the session's target layout.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use arcalib_core::{read_json, write_json, Detection, JsonIoError};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{DetectError, Frame, TargetDetector};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SidecarCorner {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerSidecar {
    #[serde(default)]
    pub corners: Vec<SidecarCorner>,
}

impl MarkerSidecar {
    pub fn from_points(ids: &[u32], points: &[Point2<f64>]) -> Self {
        Self {
            corners: ids
                .iter()
                .zip(points)
                .map(|(&id, p)| SidecarCorner { id, x: p.x, y: p.y })
                .collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, JsonIoError> {
        read_json(path)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), JsonIoError> {
        write_json(self, path)
    }

    pub fn to_detection(&self) -> Detection {
        Detection::with_ids(
            self.corners.iter().map(|c| Point2::new(c.x, c.y)).collect(),
            self.corners.iter().map(|c| c.id).collect(),
        )
    }

    fn duplicate_id(&self) -> Option<u32> {
        let mut seen = HashSet::new();
        self.corners.iter().map(|c| c.id).find(|id| !seen.insert(*id))
    }
}

/// Sidecar path for a frame file: same stem, `.json` extension.
pub fn sidecar_path(frame_path: &Path) -> PathBuf {
    frame_path.with_extension("json")
}

/// Reads detections from the frame's sidecar file.
#[derive(Clone, Copy, Debug, Default)]
pub struct SidecarDetector;

impl TargetDetector for SidecarDetector {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn detect(&self, frame: &Frame) -> Result<Detection, DetectError> {
        let Some(source) = frame.source() else {
            log::debug!("frame {} has no source file; no markers", frame.index);
            return Ok(Detection::default());
        };
        let path = sidecar_path(source);
        if !path.exists() {
            log::debug!("no marker file {}", path.display());
            return Ok(Detection::default());
        }

        let sidecar = MarkerSidecar::load(&path).map_err(|source| DetectError::Sidecar {
            path: path.clone(),
            source,
        })?;
        if let Some(id) = sidecar.duplicate_id() {
            return Err(DetectError::InvalidSidecar {
                path,
                reason: format!("id {id} appears twice"),
            });
        }
        Ok(sidecar.to_detection())
    }
}
