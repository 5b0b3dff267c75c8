//! Session notifications.
//!
//! The session fans events out over bounded channels. Slow subscribers lose
//! events rather than stall the encoder.

use crate::state::CaptureState;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::path::PathBuf;

/// Events queued per subscriber before new ones are dropped.
pub const EVENT_QUEUE_DEPTH: usize = 256;

/// Capture progress, measured in written audio.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureProgress {
    /// 0.0..=1.0
    pub fraction: f32,
    pub frames_recorded: u64,
    pub target_frames: u64,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
}

impl CaptureProgress {
    pub fn percent(&self) -> f32 {
        self.fraction * 100.0
    }
}

/// Live session metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureMetrics {
    /// Peak of the most recent block.
    pub current_peak: f32,
    /// Held peak since the session started.
    pub peak: f32,
    /// Smoothed RMS.
    pub rms: f32,
    /// Frames written to the output.
    pub frames_processed: u64,
    pub buffer_overruns: u64,
    pub buffer_underruns: u64,
    /// Average encode time as a percentage of real time.
    pub cpu_load_percent: f32,
    /// Audio waiting in the ring.
    pub latency_ms: f32,
}

/// Final outcome of a session. One per session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub state: CaptureState,
    pub path: PathBuf,
    pub frames: u64,
    pub duration_ms: u64,
    pub peak: f32,
    pub rms: f32,
    pub file_size_bytes: u64,
    pub error: Option<String>,
}

impl CaptureResult {
    pub fn is_success(&self) -> bool {
        self.state == CaptureState::Completed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    StateChanged {
        state: CaptureState,
        message: String,
    },
    Progress(CaptureProgress),
    Metrics(CaptureMetrics),
    Completed(CaptureResult),
}

/// Subscriber side of the event fan-out.
pub struct CaptureEvents {
    rx: Receiver<CaptureEvent>,
}

impl CaptureEvents {
    /// Next pending event (non-blocking).
    pub fn try_next(&self) -> Option<CaptureEvent> {
        self.rx.try_recv().ok()
    }

    /// All pending events.
    pub fn drain(&self) -> Vec<CaptureEvent> {
        self.rx.try_iter().collect()
    }

    /// Drain and keep only the newest progress report.
    pub fn latest_progress(&self) -> Option<CaptureProgress> {
        self.rx
            .try_iter()
            .filter_map(|e| match e {
                CaptureEvent::Progress(p) => Some(p),
                _ => None,
            })
            .last()
    }
}

/// Publisher side, owned by the session.
#[derive(Default)]
pub(crate) struct EventHub {
    subscribers: Vec<Sender<CaptureEvent>>,
}

impl EventHub {
    pub(crate) fn subscribe(&mut self) -> CaptureEvents {
        let (tx, rx) = crossbeam_channel::bounded(EVENT_QUEUE_DEPTH);
        self.subscribers.push(tx);
        CaptureEvents { rx }
    }

    pub(crate) fn emit(&mut self, event: CaptureEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        // Drop if full, forget subscribers that went away
        self.subscribers
            .retain(|tx| !matches!(tx.try_send(event.clone()), Err(TrySendError::Disconnected(_))));
    }
}
