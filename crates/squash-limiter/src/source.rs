//! What the selector needs to know about tracks, and system load.

use squash_pattern::{Pattern, MAX_STEPS};
use std::ops::RangeInclusive;

/// Priority of a track without an explicit one: earlier tracks rank higher.
pub fn default_priority(track: usize) -> u8 {
    255u8.saturating_sub((track.min(15) * 16) as u8)
}

/// Read-only view of track content.
pub trait TrackSource {
    /// Active steps of `track` within `steps`.
    fn active_steps(&self, track: usize, steps: RangeInclusive<usize>) -> usize;

    fn effect_count(&self, _track: usize) -> usize {
        0
    }

    fn priority(&self, track: usize) -> u8 {
        default_priority(track)
    }

    /// Steps per track that may be addressed.
    fn step_capacity(&self) -> usize {
        MAX_STEPS
    }
}

impl TrackSource for Pattern {
    fn active_steps(&self, track: usize, steps: RangeInclusive<usize>) -> usize {
        self.count_active_steps(track, steps)
    }

    fn effect_count(&self, track: usize) -> usize {
        self.track_config(track)
            .map_or(0, |c| c.effect_count as usize)
    }

    fn priority(&self, track: usize) -> u8 {
        self.track_config(track)
            .and_then(|c| c.priority)
            .unwrap_or_else(|| default_priority(track))
    }
}

/// Current system load.
pub trait SystemMonitor: Send + Sync {
    /// 0.0-1.0
    fn cpu_load(&self) -> f32;
    fn memory_usage_kb(&self) -> u32;
}

/// Monitor reporting fixed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMonitor {
    pub cpu_load: f32,
    pub memory_usage_kb: u32,
}

impl SystemMonitor for FixedMonitor {
    fn cpu_load(&self) -> f32 {
        self.cpu_load
    }

    fn memory_usage_kb(&self) -> u32 {
        self.memory_usage_kb
    }
}
