//! Harris corner viewer over a frame stream.

use std::path::Path;
use std::time::Duration;

use arcalib_vision::{draw_corners, harris_corners, HarrisParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::live::save_annotated;
use crate::{FrameSource, Key, KeySource, LiveError, LoopExit};

#[derive(Clone, Debug, PartialEq)]
pub struct CornersReport {
    pub exit: LoopExit,
    pub frames: usize,
    /// Corner pixels marked over all frames.
    pub corners: usize,
}

/// Mark Harris corners on every frame until quit or end of stream. Only the
/// quit key is honoured.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn run_corners(
    frames: &mut dyn FrameSource,
    keys: &mut dyn KeySource,
    params: &HarrisParams,
    key_delay: Duration,
    save_dir: Option<&Path>,
) -> Result<CornersReport, LiveError> {
    let mut report = CornersReport {
        exit: LoopExit::EndOfStream,
        frames: 0,
        corners: 0,
    };

    while let Some(frame) = frames.next_frame()? {
        report.frames += 1;
        let corners = harris_corners(&frame.gray(), params);
        log::debug!("frame {}: {} corner pixels", frame.index, corners.len());
        report.corners += corners.len();

        if let Some(dir) = save_dir {
            let mut annotated = frame.image.clone();
            draw_corners(&mut annotated, &corners);
            save_annotated(dir, frame.index, &annotated)?;
        }

        if keys.wait_key(key_delay) == Key::Quit {
            report.exit = LoopExit::Quit;
            break;
        }
    }
    log::info!(
        "corner viewer: {} frames, {} corner pixels",
        report.frames,
        report.corners
    );
    Ok(report)
}
