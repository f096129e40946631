use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::settings::PlaybackSettings;

/// Reads a timeline document from disk.
///
/// Only I/O and JSON syntax failures are errors. A document that parses but
/// is not an array is returned as-is and becomes an empty timeline during
/// validation.
pub fn load_timeline_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::TimelineIo {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = serde_json::from_str(&text).map_err(|source| EngineError::TimelineParse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "timeline loaded");
    Ok(raw)
}

/// Reads playback settings from a JSON document.
pub fn load_settings(path: impl AsRef<Path>) -> Result<PlaybackSettings> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::SettingsIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| EngineError::SettingsParse {
        path: path.to_path_buf(),
        source,
    })
}
