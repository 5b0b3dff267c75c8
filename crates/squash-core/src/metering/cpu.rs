//! Processing-load tracking for the encode path.

use crate::AtomicFloat;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// CPU metrics snapshot. Loads are percentages of the block's real-time budget.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuMetrics {
    pub average: f32,
    pub peak: f32,
    pub current: f32,
    /// Blocks that took longer to encode than they last.
    pub late_blocks: u64,
}

/// Measures how long a block took against how long it plays for.
#[derive(Debug)]
pub struct CpuMeter {
    current: AtomicFloat,
    peak: AtomicFloat,
    average: AtomicFloat,
    late_blocks: AtomicU64,
    samples: AtomicU32,
    sample_rate: f64,
}

impl CpuMeter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            current: AtomicFloat::new(0.0),
            peak: AtomicFloat::new(0.0),
            average: AtomicFloat::new(0.0),
            late_blocks: AtomicU64::new(0),
            samples: AtomicU32::new(0),
            sample_rate: sample_rate.max(1) as f64,
        }
    }

    pub fn record(&self, frames: usize, elapsed: Duration) {
        if frames == 0 {
            return;
        }

        let budget = frames as f64 / self.sample_rate;
        let load = (elapsed.as_secs_f64() / budget) as f32;

        self.current.set(load);
        self.peak.store_max(load);

        // Exponential moving average, warming up over the first 100 blocks
        let count = self.samples.fetch_add(1, Ordering::Relaxed);
        let alpha = 1.0 / (count.min(100) + 1) as f32;
        let avg = self.average.get();
        self.average.set(avg * (1.0 - alpha) + load * alpha);

        if elapsed.as_secs_f64() > budget {
            self.late_blocks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn metrics(&self) -> CpuMetrics {
        CpuMetrics {
            average: self.average.get() * 100.0,
            peak: self.peak.get() * 100.0,
            current: self.current.get() * 100.0,
            late_blocks: self.late_blocks.load(Ordering::Relaxed),
        }
    }

    pub fn average_percent(&self) -> f32 {
        self.average.get() * 100.0
    }

    pub fn reset(&self) {
        self.current.set(0.0);
        self.peak.set(0.0);
        self.average.set(0.0);
        self.late_blocks.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
    }
}
