//! Error types for squash-core.

use thiserror::Error;

/// Error type for squash-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid channel count: {0}. Must be 1 or 2")]
    InvalidChannelCount(usize),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for squash-core operations.
pub type Result<T> = std::result::Result<T, Error>;
