//! Step patterns and safe destructive edits for the tape-squash engine.
//!
//! - [`Pattern`]: up to 16 tracks of 256 [`Step`]s with an active length
//! - [`PatternTransaction`]: backup, replace, validate, commit or roll back,
//!   with undo/redo over a bounded [`BackupStore`]
//! - [`PatternValidator`]: pluggable region checks ([`StandardValidator`] by default)
//!
//! ```ignore
//! use squash_pattern::*;
//!
//! let mut pattern = Pattern::new(8)?;
//! let mut tx = PatternTransaction::new();
//! let result = tx.clear_and_replace_with_sample(&mut pattern, &SelectionBounds::new(0, 3, 0, 15), 4, None);
//! assert!(result.success);
//! tx.undo(&mut pattern);
//! ```

pub mod backup;
pub mod codec;
pub mod error;
pub mod pattern;
pub mod selection;
pub mod transaction;
pub mod validate;

pub use backup::{BackupId, BackupStore, PatternBackup, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_BACKUP_BYTES};
pub use error::{Error, Result};
pub use pattern::{Pattern, Step, TrackConfig, DEFAULT_LENGTH, MAX_STEPS, MAX_TRACKS};
pub use selection::SelectionBounds;
pub use transaction::{
    PatternEvent, PatternEvents, PatternTransaction, ReplacementConfig, ReplacementResult,
    ReplacementType, DEFAULT_MAX_UNDO_DEPTH,
};
pub use validate::{PatternValidator, StandardValidator, ValidationReport};
