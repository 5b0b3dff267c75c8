//! Resource admission for tape-squash operations.
//!
//! [`ResourceSelector`] estimates the memory and CPU cost of squashing a set
//! of tracks, checks it against the configured [`LimitMode`], and proposes a
//! reduced selection ranked by priority and complexity when it does not fit.
//! Track content comes from any [`TrackSource`]; [`squash_pattern::Pattern`]
//! implements it.

pub mod analysis;
pub mod config;
pub mod error;
pub mod selector;
pub mod source;

pub use analysis::{PerformanceMetrics, SquashAnalysis, TrackAnalysis};
pub use config::{
    CostModel, LimitConfig, LimitMode, MAX_CPU_LIMIT, MAX_MEMORY_LIMIT_KB, MAX_TRACK_LIMIT,
    MIN_CPU_LIMIT, MIN_MEMORY_LIMIT_KB, MIN_TRACK_LIMIT,
};
pub use error::{Error, Result};
pub use selector::ResourceSelector;
pub use source::{default_priority, FixedMonitor, SystemMonitor, TrackSource};
