//! Analysis results.

use serde::{Deserialize, Serialize};

/// Cost estimate for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub track: usize,
    pub active_steps: usize,
    pub effect_count: usize,
    /// Rough count of modulated steps.
    pub modulation_estimate: usize,
    pub cpu_load: f32,
    pub memory_kb: u32,
    /// 0.0-1.0
    pub complexity: f32,
    pub priority: u8,
    pub is_recommended: bool,
}

impl TrackAnalysis {
    /// Ranking score: priority penalised by complexity.
    pub fn score(&self) -> f32 {
        self.priority as f32 - self.complexity * 50.0
    }
}

/// Whole-operation analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquashAnalysis {
    pub tracks: Vec<TrackAnalysis>,
    /// Tracks to capture. The requested set when no optimisation is needed.
    pub recommended_tracks: Vec<usize>,
    /// Selection sized to the effective limit, when the request exceeds it.
    pub alternative_selection: Vec<usize>,
    pub total_memory_kb: u32,
    pub total_cpu_load: f32,
    pub estimated_processing_ms: u32,
    pub within_limits: bool,
    pub requires_optimization: bool,
    pub recommendation: String,
    /// Headline warning, if any.
    pub warning: Option<String>,
    pub warnings: Vec<String>,
}

impl SquashAnalysis {
    pub fn track_ids(&self) -> Vec<usize> {
        self.tracks.iter().map(|t| t.track).collect()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Running totals over admitted and rejected operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub successful_operations: u32,
    pub failed_operations: u32,
    pub rejected_operations: u32,
    pub warning_operations: u32,
    pub average_processing_ms: f32,
    pub average_memory_kb: f32,
    pub average_cpu_load: f32,
    pub last_rejection: Option<String>,
}
