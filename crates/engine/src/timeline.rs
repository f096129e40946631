use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::time::Millis;

/// Validated timeline entry: a well-formed envelope whose body has not been
/// decoded yet.
///
/// Kind-specific fields are checked at dispatch time so that a bad body only
/// costs its own event.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Position in the authored array, before sorting.
    pub index: usize,
    pub t: Millis,
    pub kind: String,
    pub body: Value,
}

impl RawEvent {
    /// Decodes the kind-specific payload.
    ///
    /// Unknown kinds decode to [`TimelineEvent::Unknown`]; known kinds with a
    /// missing or mistyped field are rejected.
    ///
    /// # Example
    /// ```
    /// use replay_engine::timeline::{RawEvent, TimelineEvent};
    /// use serde_json::json;
    ///
    /// let raw = RawEvent {
    ///     index: 0,
    ///     t: 50,
    ///     kind: "panel_show".to_owned(),
    ///     body: json!({"t": 50, "event": "panel_show", "panel": "changeAddress"}),
    /// };
    /// assert_eq!(
    ///     raw.decode().unwrap(),
    ///     TimelineEvent::PanelShow { panel: "changeAddress".to_owned() }
    /// );
    /// ```
    pub fn decode(&self) -> Result<TimelineEvent> {
        TimelineEvent::deserialize(&self.body).map_err(|source| EngineError::InvalidPayload {
            kind: self.kind.clone(),
            t: self.t,
            source,
        })
    }
}

/// Decoded timeline event payload, keyed by the `event` discriminant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEvent {
    Transcript {
        speaker: Speaker,
        text: String,
    },
    AiReasoning {
        text: String,
    },
    AiActionAttempt {
        action: String,
    },
    AiActionBlocked {
        action: String,
        reason: String,
    },
    PanelShow {
        panel: String,
    },
    PanelHide {
        panel: String,
    },
    AutoPopulate {
        panel: String,
        data: Map<String, Value>,
    },
    MouseMove {
        target: String,
    },
    MouseClick {
        target: String,
    },
    TabSwitch {
        tab: String,
    },
    TabLoading {
        tab: String,
    },
    TabLoaded {
        tab: String,
    },
    /// Reserved: decoded and validated, never applied.
    FormTyping {
        field: String,
        value: String,
    },
    Narration {
        text: String,
    },
    /// `value` may be authored as an integer or a float; the reducer
    /// range-checks and rounds it.
    Sentiment {
        value: f64,
        label: SentimentLabel,
    },
    #[serde(other)]
    Unknown,
}

/// Conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Customer,
    Agent,
}

/// Coarse sentiment bucket shown next to the gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

/// One line of the call transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: Millis,
}

/// Kind of an AI activity feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiActivityKind {
    Reasoning,
    ActionAttempt,
    ActionBlocked,
}

/// One entry of the AI activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiActivity {
    #[serde(rename = "type")]
    pub kind: AiActivityKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: Millis,
}

/// Latest sentiment reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sentiment {
    pub value: u8,
    pub label: SentimentLabel,
}

/// Ordered, validated event sequence driving one playback session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub events: Vec<RawEvent>,
}

impl Timeline {
    /// Validates and sorts a raw payload. Never fails; see
    /// [`crate::validate::validate_timeline`].
    pub fn from_value(raw: &Value) -> Self {
        Self {
            events: crate::validate::validate_timeline(raw),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offset of the last event, or zero for an empty timeline.
    pub fn duration_ms(&self) -> Millis {
        self.events.last().map(|event| event.t).unwrap_or(0)
    }

    /// Offsets of every event in dispatch order.
    pub fn offsets(&self) -> Vec<Millis> {
        self.events.iter().map(|event| event.t).collect()
    }
}
