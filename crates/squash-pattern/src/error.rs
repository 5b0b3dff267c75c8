//! Error types.

use crate::backup::BackupId;
use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Track index past the pattern's track count.
    #[error("Track {0} out of range")]
    TrackOutOfRange(usize),

    /// Step index past the step capacity.
    #[error("Step {0} out of range")]
    StepOutOfRange(usize),

    /// Pattern length or track count outside its valid range.
    #[error("Invalid pattern size: {0}")]
    InvalidSize(String),

    /// Selection bounds unusable for this pattern.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// No backup with this id in the pool.
    #[error("Backup {0} not found")]
    BackupNotFound(BackupId),

    /// Backup payload failed to serialise or deserialise.
    #[error("Backup serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Backup payload failed to decompress or does not match its region.
    #[error("Corrupt backup: {0}")]
    CorruptBackup(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
