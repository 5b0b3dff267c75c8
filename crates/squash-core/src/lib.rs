//! Real-time building blocks for the tape-squash engine.
//!
//! # Primary API
//!
//! - [`RingCapture`]: lock-free SPSC hand-off from the audio callback to the encoder
//! - [`LevelMeter`] / [`AtomicLevels`]: peak and smoothed RMS metering
//! - [`CpuMeter`]: processing-load tracking for the encode path
//! - [`AtomicFloat`] / [`AtomicFlag`]: cache-aligned atomics for status shared across threads
//!
//! Nothing on the producer path of [`RingCapture`] allocates or locks.

pub mod error;
pub use error::{Error, Result};

pub mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat};

pub mod ring;
pub use ring::{CaptureConsumer, CaptureProducer, RingCapture, RingStats, MAX_RING_FRAMES, MIN_RING_FRAMES};

pub mod metering;
pub use metering::{
    amplitude_to_db, AtomicLevels, CpuMeter, CpuMetrics, LevelMeter, LevelSnapshot, RMS_DECAY,
};

pub use std::sync::atomic::Ordering;
