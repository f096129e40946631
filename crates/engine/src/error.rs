use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced while loading, decoding and applying timeline events.
#[derive(Debug)]
pub enum EngineError {
    InvalidPayload {
        kind: String,
        t: u64,
        source: serde_json::Error,
    },
    SentimentOutOfRange {
        t: u64,
        value: f64,
    },
    TimelineIo {
        path: PathBuf,
        source: std::io::Error,
    },
    TimelineParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    SettingsIo {
        path: PathBuf,
        source: std::io::Error,
    },
    SettingsParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Returns true for failures caused by a malformed event body.
    ///
    /// These are logged as warnings at the dispatch boundary; everything else
    /// that escapes the reducer is logged as an error.
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload { .. } | Self::SentimentOutOfRange { .. }
        )
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPayload { kind, t, source } => {
                write!(f, "invalid {kind} event at t={t}: {source}")
            }
            Self::SentimentOutOfRange { t, value } => {
                write!(f, "sentiment value {value} at t={t} is outside 0..=100")
            }
            Self::TimelineIo { path, source } => {
                write!(f, "failed to read timeline {} ({source})", path.display())
            }
            Self::TimelineParse { path, source } => {
                write!(f, "timeline {} is not valid JSON ({source})", path.display())
            }
            Self::SettingsIo { path, source } => {
                write!(
                    f,
                    "failed to read playback settings {} ({source})",
                    path.display()
                )
            }
            Self::SettingsParse { path, source } => {
                write!(
                    f,
                    "playback settings {} could not be parsed ({source})",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPayload { source, .. } => Some(source),
            Self::TimelineIo { source, .. } => Some(source),
            Self::TimelineParse { source, .. } => Some(source),
            Self::SettingsIo { source, .. } => Some(source),
            Self::SettingsParse { source, .. } => Some(source),
            Self::SentimentOutOfRange { .. } => None,
        }
    }
}
