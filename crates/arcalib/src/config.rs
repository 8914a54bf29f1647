//! JSON configuration for the live loops.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arcalib_core::{read_json, write_json, ChessboardSpec, JsonIoError};
use arcalib_session::{SessionOptions, DEFAULT_MIN_SAMPLES, DEFAULT_RESULT_FILE};
use arcalib_vision::{
    BoardRender, CharucoParams, ChessboardParams, HarrisParams, MarkerRender, ZhangOptions,
};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Json(#[from] JsonIoError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the `video`, `chessboard`, `corners` and `generate` commands
/// read. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub board: ChessboardSpec,
    pub min_samples: usize,
    /// Calibration output; `null` keeps results in memory only.
    pub output: Option<PathBuf>,
    /// Milliseconds to wait for a key per frame.
    pub key_delay_ms: u64,
    /// Run calibration on the loop thread instead of a worker.
    pub blocking: bool,
    /// Side of the virtual pyramid, in target units.
    pub pyramid_base: f64,
    pub axis_length: f64,
    pub calibrator: ZhangOptions,
    pub chessboard: ChessboardParams,
    pub charuco: CharucoParams,
    pub harris: HarrisParams,
    pub render: BoardRender,
    pub marker: MarkerRender,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            board: ChessboardSpec::default(),
            min_samples: DEFAULT_MIN_SAMPLES,
            output: Some(PathBuf::from(DEFAULT_RESULT_FILE)),
            key_delay_ms: 30,
            blocking: false,
            pyramid_base: 100.0,
            axis_length: 30.0,
            calibrator: ZhangOptions::default(),
            chessboard: ChessboardParams::default(),
            charuco: CharucoParams::default(),
            harris: HarrisParams::default(),
            render: BoardRender::default(),
            marker: MarkerRender::default(),
        }
    }
}

impl LiveConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        Ok(write_json(self, path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board.cols < 2 || self.board.rows < 2 {
            return Err(ConfigError::Invalid(format!(
                "board needs at least 2x2 inner corners, got {}x{}",
                self.board.cols, self.board.rows
            )));
        }
        if !(self.board.square_size.is_finite() && self.board.square_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "square_size must be positive, got {}",
                self.board.square_size
            )));
        }
        if self.min_samples == 0 {
            return Err(ConfigError::Invalid("min_samples must be at least 1".into()));
        }
        if self.render.square_px == 0 {
            return Err(ConfigError::Invalid("render.square_px must be positive".into()));
        }
        let rel = self.charuco.marker_size_rel;
        if !(rel > 0.0 && rel <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "charuco.marker_size_rel must be in (0, 1], got {rel}"
            )));
        }
        Ok(())
    }

    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            min_samples: self.min_samples,
            output_path: self.output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_the_demo_board() {
        let cfg = LiveConfig::default();
        assert_eq!((cfg.board.cols, cfg.board.rows), (9, 6));
        assert_eq!(cfg.board.square_size, 25.0);
        assert_eq!(cfg.min_samples, 5);
        assert_eq!(cfg.key_delay(), Duration::from_millis(30));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("live.json");
        std::fs::write(&path, r#"{ "min_samples": 8, "board": { "cols": 7, "rows": 5, "square_size": 30.0 } }"#)
            .expect("write");
        let cfg = LiveConfig::load_json(&path).expect("load");
        assert_eq!(cfg.min_samples, 8);
        assert_eq!(cfg.board.cols, 7);
        assert_eq!(cfg.harris, HarrisParams::default());
        assert_eq!(cfg.charuco.dictionary, "DICT_6X6_250");
        assert_eq!(cfg.marker.side_px, 200);
        assert_eq!(cfg.session_options().min_samples, 8);
    }

    #[test]
    fn rejects_degenerate_values() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        let mut cfg = LiveConfig::default();
        cfg.min_samples = 0;
        cfg.write_json(&path).expect("write");
        assert!(matches!(
            LiveConfig::load_json(&path),
            Err(ConfigError::Invalid(_))
        ));

        let mut cfg = LiveConfig::default();
        cfg.charuco.marker_size_rel = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
