//! Level and load metering for the capture path.
//!
//! - [`LevelMeter`]: owned by the encoder, updated once per block
//! - [`AtomicLevels`]: published copy of the latest levels for other threads
//! - [`CpuMeter`]: time spent encoding relative to the audio the block represents

mod cpu;
mod level;

pub use cpu::{CpuMeter, CpuMetrics};
pub use level::{AtomicLevels, LevelMeter, LevelSnapshot, RMS_DECAY};

/// Convert linear amplitude to dBFS. Silence maps to -inf.
#[inline]
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * amplitude.log10()
    }
}
