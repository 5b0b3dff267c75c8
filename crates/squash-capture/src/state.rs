//! Capture session states.

use serde::{Deserialize, Serialize};

/// Capture state, stored as an `AtomicU8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    /// Output file being created
    Initializing = 1,
    Recording = 2,
    Paused = 3,
    /// Flushing and patching the header
    Finalizing = 4,
    Completed = 5,
    Cancelled = 6,
    Error = 7,
}

impl CaptureState {
    /// A session exists and has not ended.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            CaptureState::Initializing
                | CaptureState::Recording
                | CaptureState::Paused
                | CaptureState::Finalizing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CaptureState::Completed | CaptureState::Cancelled | CaptureState::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Initializing => "initializing",
            CaptureState::Recording => "recording",
            CaptureState::Paused => "paused",
            CaptureState::Finalizing => "finalizing",
            CaptureState::Completed => "completed",
            CaptureState::Cancelled => "cancelled",
            CaptureState::Error => "error",
        }
    }
}

impl From<u8> for CaptureState {
    fn from(value: u8) -> Self {
        match value {
            0 => CaptureState::Idle,
            1 => CaptureState::Initializing,
            2 => CaptureState::Recording,
            3 => CaptureState::Paused,
            4 => CaptureState::Finalizing,
            5 => CaptureState::Completed,
            6 => CaptureState::Cancelled,
            _ => CaptureState::Error,
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
