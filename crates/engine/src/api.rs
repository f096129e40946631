use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};
use crate::loader::load_timeline_file;
use crate::reducer::{Applied, apply_event};
use crate::scheduler::{PlaybackStatus, Scheduler};
use crate::settings::PlaybackSettings;
use crate::state::{DeskState, TileStatus};
use crate::time::{Clock, Millis, SystemClock, duration_until};
use crate::timeline::Timeline;

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Reset,
    /// Reports a tile form submission.
    ///
    /// # Example
    /// ```
    /// use replay_engine::{Command, Engine, ManualClock, TileStatus};
    /// use serde_json::{Map, json};
    ///
    /// let mut engine = Engine::new(ManualClock::new(), &json!([]));
    /// engine
    ///     .handle_command(Command::Submit {
    ///         panel: "changeAddress".to_owned(),
    ///         form_data: Map::new(),
    ///     })
    ///     .expect("submit never fails");
    /// assert_eq!(engine.state().tile_status("changeAddress"), TileStatus::Submitting);
    /// ```
    Submit {
        panel: String,
        form_data: Map<String, Value>,
    },
    ScheduleAutoStart,
    /// Replaces the timeline with a new untrusted payload and rewinds.
    LoadTimeline {
        raw: Value,
    },
    LoadTimelineFile {
        path: PathBuf,
    },
    /// Fires every timer that has expired.
    Advance,
    /// Requests a snapshot of the current state.
    Refresh,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PlaybackChanged {
        status: PlaybackStatus,
        current_time_ms: Millis,
    },
    EventDispatched {
        index: usize,
        t: Millis,
        kind: String,
    },
    EventRejected {
        index: usize,
        t: Millis,
        kind: String,
        message: String,
    },
    SnapshotChanged(Box<DeskSnapshot>),
    Error(EngineErrorEvent),
}

/// A failed command, reported to renderers. Only timeline loading can fail,
/// so renderers treat it as "timeline unavailable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

/// Immutable view of the engine consumed by renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeskSnapshot {
    pub state: DeskState,
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub current_time_ms: Millis,
    pub position_ms: Millis,
    pub cursor: usize,
    pub event_count: usize,
    pub duration_ms: Millis,
    pub event_offsets: Vec<Millis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TimerKind {
    AutoStart,
    PointerHide,
    Submission,
    Dispatch,
}

/// Observable bits compared before and after a call to decide whether a
/// snapshot must be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    revision: u64,
    status: PlaybackStatus,
    cursor: usize,
}

/// Timeline replay engine: scheduler, state store and secondary timers.
///
/// All timers are plain deadlines owned by the engine; nothing fires unless
/// the owner calls [`Engine::advance`] (or any control method, which catches
/// up first). Dropping the engine therefore cancels everything.
#[derive(Debug)]
pub struct Engine<C> {
    clock: C,
    settings: PlaybackSettings,
    scheduler: Scheduler,
    state: DeskState,
    revision: u64,
    auto_start_due_ms: Option<Millis>,
    auto_start_armed: bool,
    has_started: bool,
    pointer_hide_due_ms: Option<Millis>,
    submissions: BTreeMap<String, Millis>,
    disposed: bool,
}

impl<C> Engine<C>
where
    C: Clock,
{
    /// Creates an engine for an untrusted timeline payload.
    ///
    /// # Example
    /// ```
    /// use replay_engine::{Engine, ManualClock, PlaybackStatus};
    /// use serde_json::json;
    ///
    /// let engine = Engine::new(ManualClock::new(), &json!("not an array"));
    /// assert!(engine.timeline().is_empty());
    /// assert_eq!(engine.status(), PlaybackStatus::Idle);
    /// ```
    pub fn new(clock: C, raw: &Value) -> Self {
        Self::with_settings(clock, raw, PlaybackSettings::default())
    }

    pub fn with_settings(clock: C, raw: &Value, settings: PlaybackSettings) -> Self {
        let timeline = Timeline::from_value(raw);
        info!(events = timeline.len(), "timeline engine created");
        Self {
            clock,
            settings,
            scheduler: Scheduler::new(timeline),
            state: DeskState::default(),
            revision: 0,
            auto_start_due_ms: None,
            auto_start_armed: false,
            has_started: false,
            pointer_hide_due_ms: None,
            submissions: BTreeMap::new(),
            disposed: false,
        }
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::Play => Ok(self.play()),
            Command::Pause => Ok(self.pause()),
            Command::Reset => Ok(self.reset()),
            Command::Submit { panel, form_data } => Ok(self.submit(&panel, &form_data)),
            Command::ScheduleAutoStart => Ok(self.schedule_auto_start()),
            Command::LoadTimeline { raw } => Ok(self.load_timeline(&raw)),
            Command::LoadTimelineFile { path } => {
                let raw = load_timeline_file(&path)?;
                Ok(self.load_timeline(&raw))
            }
            Command::Advance => Ok(self.advance()),
            Command::Refresh => Ok(vec![Event::SnapshotChanged(Box::new(self.snapshot()))]),
        }
    }

    /// Starts playback, or resumes it from the paused offset.
    pub fn play(&mut self) -> Vec<Event> {
        self.control(|engine, now, events| {
            engine.has_started = true;
            engine.start_playback(now, events);
        })
    }

    /// Pauses playback. Events already due are dispatched first.
    pub fn pause(&mut self) -> Vec<Event> {
        self.control(|engine, now, events| {
            if engine.scheduler.pause(now) {
                info!(
                    position_ms = engine.scheduler.position_ms(now),
                    cursor = engine.scheduler.cursor(),
                    "playback paused"
                );
                engine.push_playback(events);
            }
        })
    }

    /// Cancels every pending timer and clears all derived state.
    pub fn reset(&mut self) -> Vec<Event> {
        self.control(|engine, _now, events| {
            engine.scheduler.reset();
            engine.pointer_hide_due_ms = None;
            engine.submissions.clear();
            engine.state.clear();
            engine.revision += 1;
            info!("playback reset");
            engine.push_playback(events);
        })
    }

    /// Marks `panel` as submitting; it completes after the configured delay.
    ///
    /// Playback is not affected. A panel that is already submitting or
    /// completed ignores further submissions.
    pub fn submit(&mut self, panel: &str, form_data: &Map<String, Value>) -> Vec<Event> {
        self.control(|engine, now, _events| {
            let status = engine.state.tile_status(panel);
            if status != TileStatus::Idle {
                debug!(panel, ?status, "submission ignored");
                return;
            }
            info!(panel, fields = form_data.len(), "tile submitted");
            engine
                .state
                .tile_statuses
                .insert(panel.to_owned(), TileStatus::Submitting);
            engine.revision += 1;
            engine.submissions.insert(
                panel.to_owned(),
                now.saturating_add(engine.settings.submit_completion_ms),
            );
        })
    }

    /// Arms the one-shot deferred start. Later calls are ignored.
    pub fn schedule_auto_start(&mut self) -> Vec<Event> {
        self.control(|engine, now, _events| {
            if engine.auto_start_armed {
                debug!("auto-start already armed");
                return;
            }
            engine.auto_start_armed = true;
            engine.auto_start_due_ms = Some(now.saturating_add(engine.settings.auto_start_delay_ms));
        })
    }

    /// Validates a new payload, replaces the timeline and rewinds playback.
    pub fn load_timeline(&mut self, raw: &Value) -> Vec<Event> {
        self.control(|engine, _now, events| {
            engine.scheduler = Scheduler::new(Timeline::from_value(raw));
            engine.pointer_hide_due_ms = None;
            engine.submissions.clear();
            engine.state.clear();
            engine.revision += 1;
            info!(events = engine.scheduler.timeline().len(), "timeline replaced");
            engine.push_playback(events);
        })
    }

    /// Fires every timer whose deadline has passed.
    pub fn advance(&mut self) -> Vec<Event> {
        self.control(|_engine, _now, _events| {})
    }

    /// Cancels every outstanding timer. The engine ignores all later calls.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let now = self.clock.now_ms();
        self.scheduler.pause(now);
        self.auto_start_due_ms = None;
        self.pointer_hide_due_ms = None;
        self.submissions.clear();
        self.disposed = true;
        debug!("timeline engine disposed");
    }

    pub fn state(&self) -> &DeskState {
        &self.state
    }

    pub fn timeline(&self) -> &Timeline {
        self.scheduler.timeline()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.scheduler.status()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Offset of the most recently dispatched event.
    pub fn current_time_ms(&self) -> Millis {
        self.scheduler.current_time_ms()
    }

    /// Live playback position, frozen while paused.
    pub fn position_ms(&self) -> Millis {
        self.scheduler.position_ms(self.clock.now_ms())
    }

    /// Earliest deadline among all pending timers.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.next_timer().map(|(due, _)| due)
    }

    /// Time a driver may sleep before calling [`Engine::advance`].
    pub fn time_until_next_deadline(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|due| duration_until(self.clock.now_ms(), due))
    }

    pub fn snapshot(&self) -> DeskSnapshot {
        let timeline = self.scheduler.timeline();
        DeskSnapshot {
            state: self.state.clone(),
            status: self.scheduler.status(),
            is_playing: self.scheduler.is_playing(),
            current_time_ms: self.scheduler.current_time_ms(),
            position_ms: self.position_ms(),
            cursor: self.scheduler.cursor(),
            event_count: timeline.len(),
            duration_ms: timeline.duration_ms(),
            event_offsets: timeline.offsets(),
        }
    }

    fn control(&mut self, action: impl FnOnce(&mut Self, Millis, &mut Vec<Event>)) -> Vec<Event> {
        if self.disposed {
            debug!("call ignored: engine disposed");
            return Vec::new();
        }
        let now = self.clock.now_ms();
        let before = self.fingerprint();
        let mut events = Vec::new();

        self.fire_due(now, &mut events);
        action(self, now, &mut events);

        if self.fingerprint() != before {
            events.push(Event::SnapshotChanged(Box::new(self.snapshot())));
        }
        events
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            revision: self.revision,
            status: self.scheduler.status(),
            cursor: self.scheduler.cursor(),
        }
    }

    fn next_timer(&self) -> Option<(Millis, TimerKind)> {
        let submission = self.submissions.values().min().copied();
        [
            self.auto_start_due_ms.map(|due| (due, TimerKind::AutoStart)),
            self.pointer_hide_due_ms.map(|due| (due, TimerKind::PointerHide)),
            submission.map(|due| (due, TimerKind::Submission)),
            self.scheduler
                .pending_due_ms()
                .map(|due| (due, TimerKind::Dispatch)),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fires expired timers in deadline order. Each timer runs "at" its own
    /// deadline, so anything it arms is measured from there rather than from
    /// `now`.
    fn fire_due(&mut self, now: Millis, events: &mut Vec<Event>) {
        while let Some((due, kind)) = self.next_timer() {
            if due > now {
                break;
            }
            match kind {
                TimerKind::AutoStart => self.fire_auto_start(due, events),
                TimerKind::PointerHide => {
                    self.pointer_hide_due_ms = None;
                    self.state.pointer.visible = false;
                    self.revision += 1;
                }
                TimerKind::Submission => self.fire_submission(due),
                TimerKind::Dispatch => self.dispatch(due, events),
            }
        }
    }

    fn fire_auto_start(&mut self, due: Millis, events: &mut Vec<Event>) {
        self.auto_start_due_ms = None;
        if self.has_started
            || self.scheduler.is_playing()
            || self.scheduler.cursor() != 0
            || self.scheduler.timeline().is_empty()
        {
            debug!(has_started = self.has_started, "auto-start skipped");
            return;
        }
        self.has_started = true;
        self.start_playback(due, events);
    }

    fn fire_submission(&mut self, due: Millis) {
        let Some(panel) = self
            .submissions
            .iter()
            .find(|(_, panel_due)| **panel_due == due)
            .map(|(panel, _)| panel.clone())
        else {
            return;
        };
        self.submissions.remove(&panel);
        if self.state.tile_status(&panel) == TileStatus::Submitting {
            self.state
                .tile_statuses
                .insert(panel.clone(), TileStatus::Completed);
            self.revision += 1;
            info!(%panel, "tile submission completed");
        }
    }

    fn dispatch(&mut self, due: Millis, events: &mut Vec<Event>) {
        let index = self.scheduler.cursor();
        let Some(event) = self.scheduler.due_event(due) else {
            return;
        };
        let t = event.t;
        let kind = event.kind.clone();
        let authored_index = event.index;
        let outcome = apply_event(&mut self.state, event, &self.settings);
        self.scheduler.complete();

        match outcome {
            Ok(Applied::Changed) => self.revision += 1,
            Ok(Applied::PointerShown { visible_for_ms }) => {
                self.revision += 1;
                self.pointer_hide_due_ms = Some(due.saturating_add(visible_for_ms));
            }
            Ok(Applied::Ignored) => {}
            Err(error) => {
                if error.is_payload_error() {
                    warn!(index = authored_index, t, %kind, %error, "event skipped");
                } else {
                    error!(index = authored_index, t, %kind, %error, "event failed");
                }
                events.push(Event::EventRejected {
                    index,
                    t,
                    kind,
                    message: error.to_string(),
                });
                self.after_dispatch(events);
                return;
            }
        }

        debug!(index, t, %kind, "event dispatched");
        events.push(Event::EventDispatched { index, t, kind });
        self.after_dispatch(events);
    }

    fn after_dispatch(&mut self, events: &mut Vec<Event>) {
        if self.scheduler.status() == PlaybackStatus::Finished {
            info!(
                current_time_ms = self.scheduler.current_time_ms(),
                "playback finished"
            );
            self.push_playback(events);
        }
    }

    fn start_playback(&mut self, now: Millis, events: &mut Vec<Event>) {
        if !self.scheduler.play(now) {
            return;
        }
        info!(
            cursor = self.scheduler.cursor(),
            events = self.scheduler.timeline().len(),
            "playback started"
        );
        self.push_playback(events);
    }

    fn push_playback(&self, events: &mut Vec<Event>) {
        events.push(Event::PlaybackChanged {
            status: self.scheduler.status(),
            current_time_ms: self.scheduler.current_time_ms(),
        });
    }
}

impl Engine<SystemClock> {
    /// Creates an engine driven by the wall clock.
    pub fn with_system_clock(raw: &Value, settings: PlaybackSettings) -> Self {
        Self::with_settings(SystemClock::new(), raw, settings)
    }
}
