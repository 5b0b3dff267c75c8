//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The operation exceeds the active limits.
    #[error("Operation exceeds performance limits: {0}")]
    LimitExceeded(String),

    /// No usable tracks after de-duplication and range filtering.
    #[error("No tracks selected")]
    EmptySelection,
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
