//! Centralized error type for the tape-squash engine.

use thiserror::Error;

/// Top-level error type wrapping each subsystem's errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] squash_core::Error),

    #[error("Export: {0}")]
    Export(#[from] squash_export::ExportError),

    #[error("Capture: {0}")]
    Capture(#[from] squash_capture::Error),

    #[error("Pattern: {0}")]
    Pattern(#[from] squash_pattern::Error),

    #[error("Admission: {0}")]
    Admission(#[from] squash_limiter::Error),

    /// Commit requested before a capture finished.
    #[error("No completed capture to commit")]
    NoCapturedAudio,

    /// The sample loader could not take the captured audio.
    #[error("Sample loader: {0}")]
    Loader(String),

    /// The pattern replacement failed and was rolled back.
    #[error("Replacement failed: {0}")]
    Replacement(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
