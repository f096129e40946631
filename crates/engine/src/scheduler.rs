use serde::Serialize;
use tracing::debug;

use crate::time::Millis;
use crate::timeline::{RawEvent, Timeline};

/// Playback state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
    Finished,
}

/// Cursor and timing bookkeeping for one timeline.
///
/// Owns at most one pending dispatch deadline. The deadline for the event at
/// the cursor is `start_ref_ms + t`, so back-dating `start_ref_ms` on resume
/// keeps every later deadline consistent with the playback time already
/// elapsed before the pause.
#[derive(Debug, Clone)]
pub struct Scheduler {
    timeline: Timeline,
    cursor: usize,
    status: PlaybackStatus,
    start_ref_ms: Millis,
    paused_offset_ms: Millis,
    current_time_ms: Millis,
    pending_due_ms: Option<Millis>,
}

impl Scheduler {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            cursor: 0,
            status: PlaybackStatus::Idle,
            start_ref_ms: 0,
            paused_offset_ms: 0,
            current_time_ms: 0,
            pending_due_ms: None,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Index of the next event to dispatch.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Offset of the most recently dispatched event.
    pub fn current_time_ms(&self) -> Millis {
        self.current_time_ms
    }

    /// Elapsed playback time, frozen while paused.
    pub fn position_ms(&self, now: Millis) -> Millis {
        match self.status {
            PlaybackStatus::Idle => 0,
            PlaybackStatus::Playing => now.saturating_sub(self.start_ref_ms),
            PlaybackStatus::Paused => self.paused_offset_ms,
            PlaybackStatus::Finished => self.current_time_ms,
        }
    }

    /// Deadline of the one outstanding dispatch timer.
    pub fn pending_due_ms(&self) -> Option<Millis> {
        self.pending_due_ms
    }

    /// Starts or resumes playback. Returns false when nothing changed.
    ///
    /// Playing and finished timelines ignore the call; a finished timeline
    /// must be reset before it can play again.
    pub fn play(&mut self, now: Millis) -> bool {
        match self.status {
            PlaybackStatus::Playing => return false,
            PlaybackStatus::Finished => {
                debug!(cursor = self.cursor, "play ignored: timeline finished");
                return false;
            }
            PlaybackStatus::Idle => self.start_ref_ms = now,
            PlaybackStatus::Paused => {
                self.start_ref_ms = now.saturating_sub(self.paused_offset_ms);
            }
        }
        self.status = PlaybackStatus::Playing;
        self.arm();
        true
    }

    /// Pauses playback and cancels the pending timer. Returns false when not
    /// playing.
    pub fn pause(&mut self, now: Millis) -> bool {
        if self.status != PlaybackStatus::Playing {
            return false;
        }
        self.pending_due_ms = None;
        self.paused_offset_ms = now.saturating_sub(self.start_ref_ms);
        self.status = PlaybackStatus::Paused;
        debug!(paused_offset_ms = self.paused_offset_ms, "playback paused");
        true
    }

    /// Cancels the pending timer and rewinds to the start.
    pub fn reset(&mut self) {
        self.pending_due_ms = None;
        self.cursor = 0;
        self.paused_offset_ms = 0;
        self.current_time_ms = 0;
        self.start_ref_ms = 0;
        self.status = PlaybackStatus::Idle;
    }

    /// Returns the event whose timer has expired at `now`, if any.
    ///
    /// The caller applies it and then calls [`Scheduler::complete`].
    pub fn due_event(&self, now: Millis) -> Option<&RawEvent> {
        let due = self.pending_due_ms?;
        if due > now {
            return None;
        }
        self.timeline.events.get(self.cursor)
    }

    /// Records the event at the cursor as dispatched and arms the next timer.
    pub fn complete(&mut self) {
        let Some(event) = self.timeline.events.get(self.cursor) else {
            return;
        };
        self.current_time_ms = event.t;
        self.cursor += 1;
        self.pending_due_ms = None;
        if self.status == PlaybackStatus::Playing {
            self.arm();
        }
    }

    fn arm(&mut self) {
        match self.timeline.events.get(self.cursor) {
            Some(event) => {
                let due = self.start_ref_ms.saturating_add(event.t);
                self.pending_due_ms = Some(due);
            }
            None => {
                self.pending_due_ms = None;
                self.status = PlaybackStatus::Finished;
                debug!(events = self.timeline.len(), "playback finished");
            }
        }
    }
}
