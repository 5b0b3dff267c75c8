//! Limit policy and cost model.

use serde::{Deserialize, Serialize};

pub const MIN_TRACK_LIMIT: usize = 1;
pub const MAX_TRACK_LIMIT: usize = 16;
pub const MIN_MEMORY_LIMIT_KB: u32 = 128;
pub const MAX_MEMORY_LIMIT_KB: u32 = 8192;
pub const MIN_CPU_LIMIT: f32 = 10.0;
pub const MAX_CPU_LIMIT: f32 = 95.0;

/// How limits are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimitMode {
    /// Reject when track count, memory or CPU exceeds its ceiling.
    StrictLimit,
    /// Always allow; report warnings.
    #[default]
    WarningLimit,
    /// Like strict, with ceilings lowered under measured system load.
    DynamicLimit,
    /// Judge the combination's cost, not its track count.
    PerformanceBased,
}

impl LimitMode {
    /// Whether a failed check blocks the operation.
    pub fn is_enforcing(self) -> bool {
        !matches!(self, LimitMode::WarningLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// 1..=16
    pub max_tracks: usize,
    /// Size of the proposed reduced selection, at most `max_tracks`.
    pub recommended_tracks: usize,
    /// Track count above which optimisation is suggested, at most `max_tracks`.
    pub warning_threshold: usize,
    pub mode: LimitMode,
    /// 128..=8192
    pub max_memory_kb: u32,
    /// 10..=95
    pub max_cpu_percent: f32,
    /// Lower the effective track limit under system load.
    pub enable_dynamic_adjustment: bool,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_tracks: 6,
            recommended_tracks: 4,
            warning_threshold: 5,
            mode: LimitMode::WarningLimit,
            max_memory_kb: 2048,
            max_cpu_percent: 75.0,
            enable_dynamic_adjustment: true,
        }
    }
}

impl LimitConfig {
    /// Clamp every field into its valid range.
    pub fn sanitized(&self) -> Self {
        let max_tracks = self.max_tracks.clamp(MIN_TRACK_LIMIT, MAX_TRACK_LIMIT);
        let max_cpu_percent = if self.max_cpu_percent.is_nan() {
            Self::default().max_cpu_percent
        } else {
            self.max_cpu_percent.clamp(MIN_CPU_LIMIT, MAX_CPU_LIMIT)
        };
        Self {
            max_tracks,
            recommended_tracks: self.recommended_tracks.min(max_tracks),
            warning_threshold: self.warning_threshold.min(max_tracks),
            mode: self.mode,
            max_memory_kb: self
                .max_memory_kb
                .clamp(MIN_MEMORY_LIMIT_KB, MAX_MEMORY_LIMIT_KB),
            max_cpu_percent,
            enable_dynamic_adjustment: self.enable_dynamic_adjustment,
        }
    }

    /// CPU ceiling as a load fraction.
    pub fn max_cpu_load(&self) -> f32 {
        self.max_cpu_percent / 100.0
    }
}

/// Per-track cost estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub base_memory_kb: u32,
    pub memory_per_step_kb: u32,
    pub base_cpu: f32,
    pub cpu_per_step: f32,
    pub cpu_per_effect: f32,
    pub base_time_ms: u32,
    pub time_per_kb_ms: u32,
    /// Milliseconds at a CPU load of 1.0.
    pub time_per_cpu_ms: f32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            base_memory_kb: 64,
            memory_per_step_kb: 4,
            base_cpu: 0.08,
            cpu_per_step: 0.01,
            cpu_per_effect: 0.05,
            base_time_ms: 1000,
            time_per_kb_ms: 1,
            time_per_cpu_ms: 5000.0,
        }
    }
}

impl CostModel {
    pub fn track_memory_kb(&self, active_steps: usize) -> u32 {
        self.base_memory_kb + active_steps as u32 * self.memory_per_step_kb
    }

    pub fn track_cpu_load(&self, active_steps: usize, effects: usize) -> f32 {
        self.base_cpu + active_steps as f32 * self.cpu_per_step + effects as f32 * self.cpu_per_effect
    }

    pub fn processing_time_ms(&self, memory_kb: u32, cpu_load: f32) -> u32 {
        self.base_time_ms + memory_kb * self.time_per_kb_ms + (cpu_load * self.time_per_cpu_ms) as u32
    }

    /// 0.0-1.0 from step density and effect count.
    pub fn complexity(active_steps: usize, effects: usize) -> f32 {
        (active_steps as f32 / 16.0 * 0.4 + effects as f32 / 8.0 * 0.6).min(1.0)
    }
}
