//! JSON file helpers shared by configs, reports and calibration files.

use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum JsonIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Load a JSON document from disk.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, JsonIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write a value to disk as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), JsonIoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
