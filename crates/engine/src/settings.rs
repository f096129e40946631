use serde::{Deserialize, Serialize};

use crate::time::Millis;

/// Fixed delays used by the engine's secondary timers.
///
/// Missing fields in a settings document fall back to the defaults.
///
/// # Example
/// ```
/// use replay_engine::PlaybackSettings;
///
/// let settings: PlaybackSettings =
///     serde_json::from_str(r#"{"submit_completion_ms": 50}"#).expect("valid settings");
/// assert_eq!(settings.submit_completion_ms, 50);
/// assert_eq!(settings.auto_start_delay_ms, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Grace period between `schedule_auto_start` and the deferred `play`.
    pub auto_start_delay_ms: Millis,
    /// Time a submitted tile spends in `submitting` before `completed`.
    pub submit_completion_ms: Millis,
    /// Pointer visibility after a `mouse_move`.
    pub pointer_move_visible_ms: Millis,
    /// Pointer visibility after a `mouse_click`.
    pub pointer_click_visible_ms: Millis,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            auto_start_delay_ms: 100,
            submit_completion_ms: 500,
            pointer_move_visible_ms: 2_000,
            pointer_click_visible_ms: 1_500,
        }
    }
}
