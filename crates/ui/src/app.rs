use std::path::PathBuf;
use std::sync::mpsc::TrySendError;
use std::time::Duration;

use iced::time::Instant;
use iced::widget::{button, canvas, column, container, row, text};
use iced::{Element, Length, Subscription, Task};
use replay_engine::{Command, DeskSnapshot, Event, Millis, PlaybackStatus, PointerAction};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeEvent, EngineCommandSender, engine_subscription};
use crate::widgets::{feed, playback_bar, tile};

const TIMELINE_DIR_ENV: &str = "REPLAY_TIMELINE_DIR";
const PLAYHEAD_TICK: Duration = Duration::from_millis(50);

/// Which authored timeline a desk replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Every panel on screen at once; the agent works manually.
    Static,
    /// Panels appear only when the timeline shows them.
    Dynamic,
}

impl Mode {
    fn title(self) -> &'static str {
        match self {
            Self::Static => "Static view",
            Self::Dynamic => "Dynamic view",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Self::Static => "static.json",
            Self::Dynamic => "dynamic.json",
        }
    }
}

/// Directory holding the authored timelines. `REPLAY_TIMELINE_DIR`
/// overrides the copy shipped with the workspace.
pub fn timeline_dir() -> PathBuf {
    std::env::var_os(TIMELINE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../timelines")))
}

/// UI messages handled by the iced app update loop.
#[derive(Debug, Clone)]
pub enum Message {
    ModeSelected(Mode),
    HomePressed,
    PlayPausePressed,
    ResetPressed,
    SubmitPressed(String),
    RetryPressed,
    Bridge(BridgeEvent),
    /// Redraw tick while playing; moves the playhead between snapshots.
    Tick(Instant),
}

/// Root UI state: the home screen or one desk backed by its own engine.
pub struct AppState {
    mode: Option<Mode>,
    timeline_dir: PathBuf,
    engine_tx: Option<EngineCommandSender>,
    snapshot: Option<DeskSnapshot>,
    snapshot_at: Option<Instant>,
    playhead_ms: Millis,
    load_error: Option<String>,
    awaiting_load: bool,
    status: String,
    bar_cache: canvas::Cache,
}

impl AppState {
    /// Boots on the home screen. No engine runs until a mode is chosen.
    pub fn boot() -> (Self, Task<Message>) {
        (Self::with_timeline_dir(timeline_dir()), Task::none())
    }

    fn with_timeline_dir(timeline_dir: PathBuf) -> Self {
        Self {
            mode: None,
            timeline_dir,
            engine_tx: None,
            snapshot: None,
            snapshot_at: None,
            playhead_ms: 0,
            load_error: None,
            awaiting_load: false,
            status: String::new(),
            bar_cache: canvas::Cache::new(),
        }
    }

    /// Handles one UI message.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ModeSelected(mode) => {
                info!(?mode, "desk opened");
                self.leave_desk();
                self.mode = Some(mode);
                self.status = String::from("starting engine");
            }
            Message::HomePressed => {
                self.leave_desk();
                self.mode = None;
            }
            Message::PlayPausePressed => {
                let command = if self.is_playing() {
                    Command::Pause
                } else {
                    Command::Play
                };
                self.send_command(command);
            }
            Message::ResetPressed => {
                self.send_command(Command::Reset);
            }
            Message::SubmitPressed(panel) => {
                let Some(kind) = tile::find(&panel) else {
                    warn!(%panel, "submit for unknown panel");
                    return Task::none();
                };
                let prefill = self
                    .snapshot
                    .as_ref()
                    .and_then(|snapshot| snapshot.state.tile_data.get(&panel));
                let form_data = tile::form_data(kind, prefill);
                self.send_command(Command::Submit { panel, form_data });
            }
            Message::RetryPressed => {
                self.request_timeline();
            }
            Message::Bridge(BridgeEvent::Ready(sender)) => {
                self.engine_tx = Some(sender);
                self.status = String::from("engine ready");
                if self.mode.is_some() {
                    self.request_timeline();
                }
            }
            Message::Bridge(BridgeEvent::Event(event)) => {
                self.apply_engine_event(event);
            }
            Message::Bridge(BridgeEvent::Disconnected) => {
                self.status = String::from("engine event channel closed");
                self.engine_tx = None;
            }
            Message::Tick(now) => {
                self.advance_playhead(now);
            }
        }

        Task::none()
    }

    fn leave_desk(&mut self) {
        // Dropping the sender stops the worker, which disposes its engine.
        self.engine_tx = None;
        self.snapshot = None;
        self.snapshot_at = None;
        self.playhead_ms = 0;
        self.load_error = None;
        self.awaiting_load = false;
        self.bar_cache.clear();
    }

    fn request_timeline(&mut self) {
        let Some(mode) = self.mode else {
            return;
        };
        let path = self.timeline_dir.join(mode.file_name());
        self.load_error = None;
        if self.send_command(Command::LoadTimelineFile { path }) {
            self.awaiting_load = true;
            self.status = String::from("loading timeline");
        }
    }

    fn send_command(&mut self, command: Command) -> bool {
        if let Some(sender) = &self.engine_tx {
            match sender.try_send(command) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.status = String::from("engine command queue is full");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.status = String::from("engine command channel closed");
                    self.engine_tx = None;
                    false
                }
            }
        } else {
            self.status = String::from("engine is not ready");
            false
        }
    }

    fn apply_engine_event(&mut self, event: Event) {
        match event {
            Event::SnapshotChanged(snapshot) => {
                if self.awaiting_load {
                    self.awaiting_load = false;
                    self.status = format!("{} events loaded", snapshot.event_count);
                    self.send_command(Command::ScheduleAutoStart);
                }
                self.playhead_ms = snapshot.position_ms;
                self.snapshot_at = Some(Instant::now());
                self.snapshot = Some(*snapshot);
                self.bar_cache.clear();
            }
            Event::PlaybackChanged { status, .. } => {
                self.status = match status {
                    PlaybackStatus::Idle => String::from("ready"),
                    PlaybackStatus::Playing => String::from("playing"),
                    PlaybackStatus::Paused => String::from("paused"),
                    PlaybackStatus::Finished => String::from("finished"),
                };
            }
            Event::EventDispatched { index, kind, .. } => {
                debug!(index, %kind, "event applied");
            }
            Event::EventRejected { index, message, .. } => {
                self.status = format!("skipped event {index}: {message}");
            }
            Event::Error(error) => {
                self.awaiting_load = false;
                self.load_error = Some(error.message);
            }
        }
    }

    fn advance_playhead(&mut self, now: Instant) {
        if let (Some(snapshot), Some(taken_at)) = (&self.snapshot, self.snapshot_at) {
            let since = now.saturating_duration_since(taken_at);
            self.playhead_ms = playback_bar::live_position_ms(snapshot, since);
        }
    }

    /// Renders the UI tree.
    pub fn view(&self) -> Element<'_, Message> {
        let Some(mode) = self.mode else {
            return self.view_home();
        };
        if let Some(message) = &self.load_error {
            return self.view_error(message);
        }
        match &self.snapshot {
            Some(snapshot) => self.view_desk(mode, snapshot),
            None => container(text("Loading timeline..."))
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into(),
        }
    }

    fn view_home(&self) -> Element<'_, Message> {
        let content = column![
            text("Financial Agent Desktop Demo").size(32),
            text("Compare a static desk with an AI-orchestrated one"),
            button(text("Static view: agent clicks tabs and fills forms"))
                .width(Length::Fill)
                .on_press(Message::ModeSelected(Mode::Static)),
            button(text("Dynamic view: AI surfaces and prefills forms"))
                .width(Length::Fill)
                .on_press(Message::ModeSelected(Mode::Dynamic)),
        ]
        .spacing(16)
        .max_width(560);

        container(content)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .padding(24)
            .into()
    }

    fn view_error<'a>(&'a self, message: &'a str) -> Element<'a, Message> {
        let content = column![
            text("Error loading timeline").size(24),
            text(message),
            row![
                button("Retry").on_press(Message::RetryPressed),
                button("Go home").on_press(Message::HomePressed),
            ]
            .spacing(12),
        ]
        .spacing(16)
        .max_width(480);

        container(content)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .padding(24)
            .into()
    }

    fn view_desk<'a>(&'a self, mode: Mode, snapshot: &'a DeskSnapshot) -> Element<'a, Message> {
        let state = &snapshot.state;
        let play_label = if snapshot.is_playing { "Pause" } else { "Play" };
        let controls = row![
            text(mode.title()).size(20),
            button("Home").on_press(Message::HomePressed),
            button(play_label).on_press_maybe(
                (snapshot.status != PlaybackStatus::Finished).then_some(Message::PlayPausePressed)
            ),
            button("Reset").on_press(Message::ResetPressed),
            text(format!(
                "{} / {}",
                feed::format_clock(snapshot.current_time_ms),
                feed::format_clock(snapshot.duration_ms)
            )),
            text(format!("Status: {}", self.status)),
        ]
        .spacing(12);

        let sentiment = match &state.sentiment {
            Some(sentiment) => format!("Sentiment: {:?} ({})", sentiment.label, sentiment.value),
            None => String::from("Sentiment: -"),
        };
        let tab = match (&state.active_tab, state.tab_loading) {
            (Some(tab), true) => format!("Tab: {tab} (loading)"),
            (Some(tab), false) => format!("Tab: {tab}"),
            (None, true) => String::from("Tab: loading"),
            (None, false) => String::from("Tab: -"),
        };
        let pointer = match (&state.pointer.target, state.pointer.action, state.pointer.visible) {
            (Some(target), Some(PointerAction::Click), true) => format!("Pointer: click {target}"),
            (Some(target), _, true) => format!("Pointer: over {target}"),
            _ => String::from("Pointer: hidden"),
        };
        let context = row![text(sentiment), text(tab), text(pointer)].spacing(24);
        let narration = text(state.narration.clone().unwrap_or_default()).size(16);

        let panels: Vec<&str> = match mode {
            Mode::Static => tile::KNOWN_TILES.iter().map(|kind| kind.panel).collect(),
            Mode::Dynamic => state.visible_panels.iter().collect(),
        };
        let tiles = if panels.is_empty() {
            column![text("No active tasks")]
        } else {
            panels.into_iter().fold(column![].spacing(12), |tiles, panel| {
                tiles.push(tile::view(
                    panel,
                    state.tile_data.get(panel),
                    state.tile_status(panel),
                    Message::SubmitPressed(panel.to_owned()),
                ))
            })
        };

        let body = row![
            container(feed::transcript(&state.transcripts)).width(Length::FillPortion(2)),
            container(tiles).width(Length::FillPortion(3)),
            container(feed::activity(&state.ai_activities)).width(Length::FillPortion(2)),
        ]
        .spacing(16)
        .height(Length::Fill);

        column![
            controls,
            playback_bar::view(snapshot, self.playhead_ms, &self.bar_cache),
            narration,
            context,
            body,
        ]
        .spacing(12)
        .padding(16)
        .into()
    }

    /// Runs one engine bridge per open desk. Leaving the desk drops the
    /// subscription and with it the engine. A redraw tick runs only while
    /// playing.
    pub fn subscription(&self) -> Subscription<Message> {
        let Some(mode) = self.mode else {
            return Subscription::none();
        };
        let bridge = engine_subscription(mode).map(Message::Bridge);
        if self.is_playing() {
            Subscription::batch([bridge, iced::time::every(PLAYHEAD_TICK).map(Message::Tick)])
        } else {
            bridge
        }
    }

    fn is_playing(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.is_playing)
    }

    #[cfg(test)]
    fn from_sender_for_test(engine_tx: EngineCommandSender, mode: Mode) -> Self {
        let mut app = Self::with_timeline_dir(PathBuf::from("timelines"));
        app.mode = Some(mode);
        app.engine_tx = Some(engine_tx);
        app
    }
}
