use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use iced::futures::{SinkExt, StreamExt, channel::mpsc as futures_mpsc, executor};
use iced::{Subscription, stream};
use replay_engine::{
    Clock, Command, Engine, EngineErrorEvent, Event, PlaybackSettings,
};
use serde_json::Value;
use tracing::{debug, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 64;

/// Sender used by the UI thread to dispatch commands to the engine thread.
pub type EngineCommandSender = mpsc::SyncSender<Command>;

/// Receiver used by the UI thread to read events emitted by the engine thread.
pub type EngineEventReceiver = mpsc::Receiver<Event>;

/// Messages emitted by the engine bridge subscription.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Ready(EngineCommandSender),
    Event(Event),
    Disconnected,
}

/// Builds a subscription that owns one engine for as long as `id` stays the
/// same. Changing the id drops the old stream, which closes its command
/// channel and disposes that engine.
pub fn engine_subscription<I>(id: I) -> Subscription<BridgeEvent>
where
    I: std::hash::Hash + 'static,
{
    Subscription::run_with_id(id, bridge_worker_stream_with(spawn_system_bridge))
}

fn bridge_worker_stream_with(
    spawn_bridge: fn() -> (EngineCommandSender, EngineEventReceiver),
) -> impl iced::futures::Stream<Item = BridgeEvent> {
    stream::channel(
        SUBSCRIPTION_CHANNEL_CAPACITY,
        move |mut output| async move {
            let (engine_tx, engine_rx) = spawn_bridge();
            let _ = output.send(BridgeEvent::Ready(engine_tx)).await;

            let (forward_tx, mut forward_rx) =
                futures_mpsc::channel::<BridgeEvent>(SUBSCRIPTION_CHANNEL_CAPACITY);

            thread::spawn(move || {
                let mut forward_tx = forward_tx;
                while let Ok(event) = engine_rx.recv() {
                    if executor::block_on(forward_tx.send(BridgeEvent::Event(event))).is_err() {
                        return;
                    }
                }
                let _ = executor::block_on(forward_tx.send(BridgeEvent::Disconnected));
            });

            while let Some(event) = forward_rx.next().await {
                if output.send(event).await.is_err() {
                    break;
                }
            }
        },
    )
}

/// Spawns the production bridge: an empty wall-clock engine waiting for a
/// timeline to be loaded.
pub fn spawn_system_bridge() -> (EngineCommandSender, EngineEventReceiver) {
    spawn_engine_bridge(Engine::with_system_clock(
        &Value::Array(Vec::new()),
        PlaybackSettings::default(),
    ))
}

/// Spawns a worker thread that owns `engine`.
///
/// The worker sleeps until either a command arrives or the engine's next
/// timer is due, so dispatch never happens on the UI thread. When every
/// sender is dropped the engine is disposed and the thread exits.
pub fn spawn_engine_bridge<C>(mut engine: Engine<C>) -> (EngineCommandSender, EngineEventReceiver)
where
    C: Clock + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::sync_channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<Event>(EVENT_CHANNEL_CAPACITY);

    thread::spawn(move || {
        loop {
            let next = match engine.time_until_next_deadline() {
                Some(wait) => match command_rx.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match command_rx.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            let result = match next {
                Some(command) => engine.handle_command(command),
                None => Ok(engine.advance()),
            };
            let events = match result {
                Ok(events) => events,
                Err(error) => {
                    warn!(%error, "engine command failed");
                    vec![Event::Error(EngineErrorEvent::from_error(&error))]
                }
            };
            if events
                .into_iter()
                .any(|event| event_tx.send(event).is_err())
            {
                break;
            }
        }
        engine.dispose();
        debug!("engine bridge stopped");
    });

    (command_tx, event_rx)
}
