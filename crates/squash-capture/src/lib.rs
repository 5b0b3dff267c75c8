//! Capture sessions for the tape-squash engine.
//!
//! A [`CaptureSession`] owns one recording at a time. The audio callback feeds
//! it through a [`CaptureInput`] (lock-free ring) or the host calls
//! [`CaptureSession::process_audio_block`] directly. Blocks run through the
//! encode pipeline and land in a WAV, AIFF or raw file whose header is
//! patched when the target length is reached or the capture is stopped.
//!
//! ```ignore
//! use squash_capture::*;
//!
//! let mut session = CaptureSession::new(CaptureConfig::default(), Default::default())?;
//! let events = session.subscribe();
//! session.start_capture("take.wav", 2000)?;
//! while session.is_active() {
//!     session.process_audio_block(&block, frames);
//! }
//! let audio = session.take_captured_audio();
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod state;

pub use audio::CapturedAudio;
pub use config::{CaptureConfig, OverwritePolicy};
pub use error::{Error, Result};
pub use events::{
    CaptureEvent, CaptureEvents, CaptureMetrics, CaptureProgress, CaptureResult,
    EVENT_QUEUE_DEPTH,
};
pub use session::{CaptureControl, CaptureInput, CaptureSession};
pub use state::CaptureState;

pub use squash_export::{AudioFormat, BitDepth, Container, ProcessingParams};
