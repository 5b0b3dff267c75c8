//! Peak and RMS metering.

use crate::AtomicFloat;

/// Per-block smoothing factor for the running RMS.
pub const RMS_DECAY: f32 = 0.99;

/// Point-in-time copy of the meter state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelSnapshot {
    /// Largest absolute sample since the last reset.
    pub peak: f32,
    /// Largest absolute sample of the most recent block.
    pub block_peak: f32,
    /// Exponentially smoothed RMS.
    pub rms: f32,
    /// RMS over every sample since the last reset.
    pub integrated_rms: f32,
}

/// Block-wise level meter.
///
/// Not shared; the owner publishes through [`AtomicLevels`] when other threads
/// need the numbers.
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    peak: f32,
    block_peak: f32,
    rms_acc: f32,
    sum_sq: f64,
    samples: u64,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one interleaved block into the meter.
    pub fn process(&mut self, block: &[f32]) {
        if block.is_empty() {
            return;
        }

        let mut block_peak = 0.0f32;
        let mut block_sq = 0.0f64;
        for &s in block {
            block_peak = block_peak.max(s.abs());
            block_sq += (s as f64) * (s as f64);
        }

        let block_rms = (block_sq / block.len() as f64).sqrt() as f32;

        self.block_peak = block_peak;
        self.peak = self.peak.max(block_peak);
        self.rms_acc = self.rms_acc * RMS_DECAY + block_rms * block_rms * (1.0 - RMS_DECAY);
        self.sum_sq += block_sq;
        self.samples += block.len() as u64;
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn block_peak(&self) -> f32 {
        self.block_peak
    }

    pub fn rms(&self) -> f32 {
        self.rms_acc.sqrt()
    }

    pub fn integrated_rms(&self) -> f32 {
        if self.samples == 0 {
            return 0.0;
        }
        (self.sum_sq / self.samples as f64).sqrt() as f32
    }

    /// Samples (not frames) seen since the last reset.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            peak: self.peak,
            block_peak: self.block_peak,
            rms: self.rms(),
            integrated_rms: self.integrated_rms(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Lock-free published levels.
#[derive(Debug, Default)]
pub struct AtomicLevels {
    peak: AtomicFloat,
    block_peak: AtomicFloat,
    rms: AtomicFloat,
    integrated_rms: AtomicFloat,
}

impl AtomicLevels {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn publish(&self, levels: &LevelSnapshot) {
        self.peak.set(levels.peak);
        self.block_peak.set(levels.block_peak);
        self.rms.set(levels.rms);
        self.integrated_rms.set(levels.integrated_rms);
    }

    #[inline]
    pub fn load(&self) -> LevelSnapshot {
        LevelSnapshot {
            peak: self.peak.get(),
            block_peak: self.block_peak.get(),
            rms: self.rms.get(),
            integrated_rms: self.integrated_rms.get(),
        }
    }

    pub fn reset(&self) {
        self.publish(&LevelSnapshot::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_peak_is_held_maximum() {
        let mut meter = LevelMeter::new();
        meter.process(&[0.1, -0.8, 0.3]);
        meter.process(&[0.2, 0.1]);
        assert_relative_eq!(meter.peak(), 0.8);
        assert_relative_eq!(meter.block_peak(), 0.2);
    }

    #[test]
    fn test_smoothed_rms_follows_recurrence() {
        let mut meter = LevelMeter::new();
        let block = [0.5f32; 64];
        let mut acc = 0.0f32;
        for _ in 0..10 {
            meter.process(&block);
            acc = acc * RMS_DECAY + 0.25 * (1.0 - RMS_DECAY);
        }
        assert_relative_eq!(meter.rms(), acc.sqrt(), epsilon = 1e-6);
        assert_relative_eq!(meter.integrated_rms(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_block_is_ignored() {
        let mut meter = LevelMeter::new();
        meter.process(&[]);
        assert_eq!(meter.samples(), 0);
        assert_eq!(meter.integrated_rms(), 0.0);
    }

    #[test]
    fn test_atomic_levels_round_trip() {
        let mut meter = LevelMeter::new();
        meter.process(&[0.25, -0.5]);
        let levels = AtomicLevels::new();
        levels.publish(&meter.snapshot());
        assert_eq!(levels.load(), meter.snapshot());
        levels.reset();
        assert_eq!(levels.load().peak, 0.0);
    }
}
