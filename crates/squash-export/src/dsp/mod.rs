//! DSP stages of the encode pipeline.
//!
//! Every stage works in place on interleaved buffers and keeps whatever
//! state it needs across blocks. None of them allocate after construction.

mod dc_block;
mod dither;
mod limiter;
mod resample;

pub use dc_block::DcBlocker;
pub use dither::{apply_dither, DitherState};
pub use limiter::Limiter;
pub use resample::LinearResampler;

/// Multiply every sample by `gain`. Unity gain is skipped.
#[inline]
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Scale `samples` so the largest magnitude equals `level`.
///
/// Silent input is left untouched. Returns the gain applied.
pub fn normalize_peak(samples: &mut [f32], level: f32) -> f32 {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= 0.0 {
        return 1.0;
    }
    let gain = level / peak;
    apply_gain(samples, gain);
    gain
}
