//! Headless timeline replay.
//!
//! Usage:
//!   cargo run -p replay-cli -- timelines/dynamic.json
//!   cargo run -p replay-cli -- timelines/dynamic.json --submit-visible --json

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use replay_engine::{
    Clock, DeskSnapshot, Engine, Event, PlaybackSettings, TileStatus, load_settings,
    load_timeline_file,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Replays an agent-desktop timeline against the wall clock.
#[derive(Parser, Debug)]
#[command(name = "replay-cli")]
#[command(about = "Replay an agent-desktop timeline headlessly")]
struct Args {
    /// Timeline document (JSON array of events)
    timeline: PathBuf,

    /// Playback settings document overriding the default delays
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Start playback immediately instead of after the auto-start delay
    #[arg(long)]
    no_auto_start: bool,

    /// Print the final snapshot as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Submit every prefilled visible tile once, as an agent confirming it
    #[arg(long)]
    submit_visible: bool,
}

fn main() -> ExitCode {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    match run(&args) {
        Ok(snapshot) => {
            if args.json {
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(json) => println!("{json}"),
                    Err(error) => {
                        error!(%error, "failed to serialize snapshot");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "replay failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> replay_engine::Result<DeskSnapshot> {
    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => PlaybackSettings::default(),
    };
    let raw = load_timeline_file(&args.timeline)?;
    let mut engine = Engine::with_system_clock(&raw, settings);

    let options = DriveOptions {
        auto_start: !args.no_auto_start,
        submit_visible: args.submit_visible,
    };
    Ok(drive(&mut engine, options, std::thread::sleep))
}

#[derive(Debug, Clone, Copy)]
struct DriveOptions {
    auto_start: bool,
    submit_visible: bool,
}

/// Runs `engine` until no timer is pending and returns the final snapshot.
///
/// `sleep` waits for the next deadline; tests pass one that advances a
/// manual clock instead.
fn drive<C, S>(engine: &mut Engine<C>, options: DriveOptions, mut sleep: S) -> DeskSnapshot
where
    C: Clock,
    S: FnMut(Duration),
{
    let events = if options.auto_start {
        engine.schedule_auto_start()
    } else {
        engine.play()
    };
    report(&events);

    while let Some(wait) = engine.time_until_next_deadline() {
        sleep(wait);
        let events = engine.advance();
        report(&events);
        if options.submit_visible {
            submit_visible(engine);
        }
    }

    let snapshot = engine.snapshot();
    info!(
        status = ?snapshot.status,
        transcripts = snapshot.state.transcripts.len(),
        activities = snapshot.state.ai_activities.len(),
        "replay complete"
    );
    engine.dispose();
    snapshot
}

fn submit_visible<C: Clock>(engine: &mut Engine<C>) {
    let ready: Vec<_> = engine
        .state()
        .visible_panels
        .iter()
        .filter(|panel| engine.state().tile_status(panel) == TileStatus::Idle)
        .filter_map(|panel| {
            let prefill = engine.state().tile_data.get(panel)?;
            Some((panel.to_owned(), prefill.clone()))
        })
        .collect();
    for (panel, form_data) in ready {
        info!(%panel, "submitting prefilled tile");
        report(&engine.submit(&panel, &form_data));
    }
}

fn report(events: &[Event]) {
    for event in events {
        match event {
            Event::PlaybackChanged {
                status,
                current_time_ms,
            } => info!(?status, current_time_ms, "playback changed"),
            Event::EventDispatched { index, t, kind } => info!(index, t, %kind, "event"),
            Event::EventRejected {
                index, t, message, ..
            } => warn!(index, t, %message, "event rejected"),
            Event::SnapshotChanged(snapshot) => debug!(cursor = snapshot.cursor, "snapshot"),
            Event::Error(error) => error!(message = %error.message, "engine error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use replay_engine::{Engine, ManualClock, PlaybackStatus, TileStatus};
    use serde_json::json;

    use super::{Args, DriveOptions, drive};

    fn drive_manual(raw: serde_json::Value, options: DriveOptions) -> replay_engine::DeskSnapshot {
        let clock = ManualClock::new();
        let mut engine = Engine::new(clock.clone(), &raw);
        drive(&mut engine, options, |wait| {
            clock.advance(wait.as_millis() as u64)
        })
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "replay-cli",
            "timelines/dynamic.json",
            "--no-auto-start",
            "--json",
            "--submit-visible",
        ])
        .expect("valid arguments");

        assert_eq!(args.timeline.to_str(), Some("timelines/dynamic.json"));
        assert!(args.no_auto_start && args.json && args.submit_visible);
        assert!(args.settings.is_none());
    }

    #[test]
    fn drives_auto_started_timeline_to_the_end() {
        let snapshot = drive_manual(
            json!([
                {"t": 0, "event": "transcript", "speaker": "customer", "text": "Hi"},
                {"t": 250, "event": "mouse_click", "target": "#verify"},
            ]),
            DriveOptions {
                auto_start: true,
                submit_visible: false,
            },
        );

        assert_eq!(snapshot.status, PlaybackStatus::Finished);
        assert_eq!(snapshot.state.transcripts.len(), 1);
        assert!(!snapshot.state.pointer.visible);
    }

    #[test]
    fn submit_visible_completes_prefilled_tiles_only() {
        let snapshot = drive_manual(
            json!([
                {"t": 0, "event": "panel_show", "panel": "changeAddress"},
                {"t": 0, "event": "panel_show", "panel": "verifyIdentity"},
                {"t": 10, "event": "auto_populate", "panel": "changeAddress", "data": {"city": "NYC"}},
            ]),
            DriveOptions {
                auto_start: false,
                submit_visible: true,
            },
        );

        assert_eq!(
            snapshot.state.tile_status("changeAddress"),
            TileStatus::Completed
        );
        assert_eq!(
            snapshot.state.tile_status("verifyIdentity"),
            TileStatus::Idle
        );
    }

    #[test]
    fn empty_timeline_with_auto_start_stays_idle() {
        let snapshot = drive_manual(
            json!([]),
            DriveOptions {
                auto_start: true,
                submit_visible: false,
            },
        );
        assert_eq!(snapshot.status, PlaybackStatus::Idle);
    }
}
