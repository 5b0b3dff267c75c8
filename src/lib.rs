//! # Tapesquash - pattern-to-sample capture engine
//!
//! Bounces a rectangular region of a multi-track step pattern to audio while
//! the sequencer plays it, then replaces the region with a single trigger of
//! the resulting sample. Every destructive edit is backed up and undoable.
//!
//! ## Architecture
//!
//! Tapesquash is an umbrella crate that coordinates:
//! - **squash-core** - Lock-free capture ring, atomic levels, CPU metering
//! - **squash-export** - Encode pipeline (gain, DC block, limiter, SRC, dither) and WAV/AIFF/raw writers
//! - **squash-capture** - Capture session state machine, events, captured audio hand-off
//! - **squash-pattern** - Step patterns, compressed backups, transactional replace with undo/redo
//! - **squash-limiter** - Resource admission and reduced-selection proposals
//!
//! [`SquashEngine`] owns one of each and runs the whole workflow on the
//! control thread.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tapesquash::prelude::*;
//!
//! let mut engine = SquashEngine::builder()
//!     .pattern(pattern)
//!     .sample_rate(48000)
//!     .limit_mode(LimitMode::StrictLimit)
//!     .build()?;
//!
//! let selection = SelectionBounds::new(0, 5, 0, 15);
//! let analysis = engine.analyze(&[0, 1, 2, 3, 4, 5], 0, 15);
//! engine.begin_capture(selection, "bounce.wav", 4000)?;
//!
//! // Audio thread: input.push_block(&block); control thread: session.pump()
//! let mut input = engine.session_mut().take_input().unwrap();
//!
//! let result = engine.commit_capture(&mut loader, selection, None)?;
//! engine.undo();
//! ```
//!
//! ## Feature Flags
//!
//! - `aiff` (default) - AIFF container output

mod builder;
mod engine;
mod error;

pub use builder::SquashEngineBuilder;
pub use engine::{SampleLoader, SquashEngine};
pub use error::{Error, Result};

/// Re-export of the subsystem crates for direct access
pub use squash_capture as capture;
pub use squash_core as core;
pub use squash_export as export;
pub use squash_limiter as limiter;
pub use squash_pattern as pattern;

// Capture
pub use squash_capture::{
    CaptureConfig, CaptureControl, CaptureEvent, CaptureEvents, CaptureInput, CaptureMetrics,
    CaptureProgress, CaptureResult, CaptureSession, CaptureState, CapturedAudio, OverwritePolicy,
};

// Encoding
pub use squash_export::{AudioFormat, BitDepth, Container, EncodePipeline, ProcessingParams};

// Pattern editing
pub use squash_pattern::{
    BackupId, Pattern, PatternEvent, PatternEvents, PatternTransaction, PatternValidator,
    ReplacementConfig, ReplacementResult, ReplacementType, SelectionBounds, Step, TrackConfig,
    ValidationReport,
};

// Admission
pub use squash_limiter::{
    FixedMonitor, LimitConfig, LimitMode, ResourceSelector, SquashAnalysis, SystemMonitor,
    TrackAnalysis, TrackSource,
};

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AudioFormat, BitDepth, CaptureConfig, CaptureEvent, CaptureState, CapturedAudio,
        Container, LimitConfig, LimitMode, Pattern, ProcessingParams, ReplacementConfig,
        ReplacementType, SampleLoader, SelectionBounds, SquashAnalysis, SquashEngine, Step,
    };
    pub use crate::{Error, Result};
}
