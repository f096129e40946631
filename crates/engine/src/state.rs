use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::timeline::{AiActivity, Sentiment, TranscriptLine};

/// Field values supplied to one tile before user interaction.
pub type Prefill = Map<String, Value>;

/// Everything renderers observe, mutated only by the reducer and the engine's
/// secondary timers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeskState {
    pub transcripts: Vec<TranscriptLine>,
    pub ai_activities: Vec<AiActivity>,
    pub visible_panels: PanelSet,
    pub tile_data: BTreeMap<String, Prefill>,
    pub tile_statuses: BTreeMap<String, TileStatus>,
    pub pointer: PointerState,
    pub active_tab: Option<String>,
    pub tab_loading: bool,
    pub narration: Option<String>,
    pub sentiment: Option<Sentiment>,
}

impl DeskState {
    /// Status of one tile; panels never submitted are idle.
    pub fn tile_status(&self, panel: &str) -> TileStatus {
        self.tile_statuses
            .get(panel)
            .copied()
            .unwrap_or(TileStatus::Idle)
    }

    /// Returns every field to its initial value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Panel identifiers in first-show order. Membership is unique.
///
/// # Example
/// ```
/// use replay_engine::state::PanelSet;
///
/// let mut panels = PanelSet::default();
/// assert!(panels.insert("verifyIdentity"));
/// assert!(!panels.insert("verifyIdentity"));
/// assert!(panels.remove("verifyIdentity"));
/// assert!(!panels.remove("verifyIdentity"));
/// assert!(panels.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PanelSet(Vec<String>);

impl PanelSet {
    /// Adds `panel`; returns false when it was already present.
    pub fn insert(&mut self, panel: &str) -> bool {
        if self.contains(panel) {
            return false;
        }
        self.0.push(panel.to_owned());
        true
    }

    /// Removes `panel`; returns false when it was absent.
    pub fn remove(&mut self, panel: &str) -> bool {
        let Some(position) = self.0.iter().position(|existing| existing == panel) else {
            return false;
        };
        self.0.remove(position);
        true
    }

    pub fn contains(&self, panel: &str) -> bool {
        self.0.iter().any(|existing| existing == panel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Submission progress of one tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileStatus {
    #[default]
    Idle,
    Submitting,
    Completed,
}

/// What the simulated pointer last did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerAction {
    Move,
    Click,
}

/// Simulated pointer consumed by the cursor animation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PointerState {
    pub target: Option<String>,
    pub action: Option<PointerAction>,
    pub visible: bool,
}
