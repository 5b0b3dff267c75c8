//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoder or container error.
    #[error("Export error: {0}")]
    Export(#[from] squash_export::ExportError),

    /// Ring or metering setup error.
    #[error(transparent)]
    Core(#[from] squash_core::Error),

    /// Configuration outside its valid range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A capture is already running.
    #[error("A capture session is already active")]
    SessionActive,

    /// Operation not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Output path does not match the configured format.
    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    /// Output exists and overwriting is forbidden.
    #[error("Output file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// Zero-length capture requested.
    #[error("Invalid capture duration: {0} ms")]
    InvalidDuration(u64),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
