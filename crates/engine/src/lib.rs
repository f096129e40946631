//! Timeline replay engine for the agent-desktop demo.

pub mod api;
pub mod error;
pub mod loader;
pub mod reducer;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod time;
pub mod timeline;
pub mod validate;

pub use api::{Command, DeskSnapshot, Engine, EngineErrorEvent, Event};
pub use error::{EngineError, Result};
pub use loader::{load_settings, load_timeline_file};
pub use scheduler::PlaybackStatus;
pub use settings::PlaybackSettings;
pub use state::{DeskState, PanelSet, PointerAction, PointerState, Prefill, TileStatus};
pub use time::{Clock, ManualClock, Millis, SystemClock};
pub use timeline::{
    AiActivity, AiActivityKind, Sentiment, SentimentLabel, Speaker, Timeline, TimelineEvent,
    TranscriptLine,
};
