use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::settings::PlaybackSettings;
use crate::state::{DeskState, PointerAction};
use crate::time::Millis;
use crate::timeline::{AiActivity, AiActivityKind, RawEvent, Sentiment, TimelineEvent, TranscriptLine};

/// Outcome of applying one event to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The store changed.
    Changed,
    /// The pointer became visible and must be hidden after `visible_for_ms`.
    PointerShown { visible_for_ms: Millis },
    /// Well-formed but not applied (unknown or reserved kind).
    Ignored,
}

/// Applies one validated event to `state`.
///
/// The payload is decoded before anything is touched, so a rejected event
/// never leaves a partial mutation behind.
///
/// # Example
/// ```
/// use replay_engine::reducer::{Applied, apply_event};
/// use replay_engine::state::DeskState;
/// use replay_engine::validate::validate_timeline;
/// use replay_engine::PlaybackSettings;
/// use serde_json::json;
///
/// let events = validate_timeline(&json!([
///     {"t": 0, "event": "ai_action_attempt", "action": "Update address"},
/// ]));
/// let mut state = DeskState::default();
/// let applied = apply_event(&mut state, &events[0], &PlaybackSettings::default())
///     .expect("valid event");
///
/// assert_eq!(applied, Applied::Changed);
/// assert_eq!(state.ai_activities[0].text, "Attempting: Update address");
/// ```
pub fn apply_event(
    state: &mut DeskState,
    event: &RawEvent,
    settings: &PlaybackSettings,
) -> Result<Applied> {
    let t = event.t;
    let applied = match event.decode()? {
        TimelineEvent::Transcript { speaker, text } => {
            state.transcripts.push(TranscriptLine {
                speaker,
                text,
                timestamp: t,
            });
            Applied::Changed
        }
        TimelineEvent::AiReasoning { text } => {
            state.ai_activities.push(AiActivity {
                kind: AiActivityKind::Reasoning,
                text,
                action: None,
                reason: None,
                timestamp: t,
            });
            Applied::Changed
        }
        TimelineEvent::AiActionAttempt { action } => {
            state.ai_activities.push(AiActivity {
                kind: AiActivityKind::ActionAttempt,
                text: format!("Attempting: {action}"),
                action: Some(action),
                reason: None,
                timestamp: t,
            });
            Applied::Changed
        }
        TimelineEvent::AiActionBlocked { action, reason } => {
            state.ai_activities.push(AiActivity {
                kind: AiActivityKind::ActionBlocked,
                text: format!("Blocked: {action}"),
                action: Some(action),
                reason: Some(reason),
                timestamp: t,
            });
            Applied::Changed
        }
        TimelineEvent::PanelShow { panel } => {
            if !state.visible_panels.insert(&panel) {
                debug!(t, %panel, "panel already visible");
            }
            Applied::Changed
        }
        TimelineEvent::PanelHide { panel } => {
            if !state.visible_panels.remove(&panel) {
                debug!(t, %panel, "panel already hidden");
            }
            Applied::Changed
        }
        TimelineEvent::AutoPopulate { panel, data } => {
            debug!(t, %panel, fields = data.len(), "tile prefilled");
            state.tile_data.insert(panel, data);
            Applied::Changed
        }
        TimelineEvent::MouseMove { target } => show_pointer(
            state,
            target,
            PointerAction::Move,
            settings.pointer_move_visible_ms,
        ),
        TimelineEvent::MouseClick { target } => show_pointer(
            state,
            target,
            PointerAction::Click,
            settings.pointer_click_visible_ms,
        ),
        TimelineEvent::TabSwitch { tab } => {
            state.active_tab = Some(tab);
            state.tab_loading = false;
            Applied::Changed
        }
        // The loading flag is global: only the most recently referenced tab
        // is meaningful.
        TimelineEvent::TabLoading { tab } => {
            debug!(t, %tab, "tab loading");
            state.tab_loading = true;
            Applied::Changed
        }
        TimelineEvent::TabLoaded { tab } => {
            debug!(t, %tab, "tab loaded");
            state.tab_loading = false;
            Applied::Changed
        }
        TimelineEvent::Narration { text } => {
            state.narration = Some(text);
            Applied::Changed
        }
        TimelineEvent::Sentiment { value, label } => {
            if !(0.0..=100.0).contains(&value) {
                return Err(EngineError::SentimentOutOfRange { t, value });
            }
            state.sentiment = Some(Sentiment {
                value: value.round() as u8,
                label,
            });
            Applied::Changed
        }
        TimelineEvent::FormTyping { field, .. } => {
            debug!(t, %field, "form_typing is reserved; not applied");
            Applied::Ignored
        }
        TimelineEvent::Unknown => {
            warn!(t, index = event.index, kind = %event.kind, "unrecognized event type");
            Applied::Ignored
        }
    };
    Ok(applied)
}

fn show_pointer(
    state: &mut DeskState,
    target: String,
    action: PointerAction,
    visible_for_ms: Millis,
) -> Applied {
    state.pointer.target = Some(target);
    state.pointer.action = Some(action);
    state.pointer.visible = true;
    Applied::PointerShown { visible_for_ms }
}
