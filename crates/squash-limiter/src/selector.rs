//! Admission control for squash operations.
//!
//! Analysis is side-effect free with respect to the pattern and may run as
//! often as the caller likes, e.g. to preview warnings while a selection is
//! being made. Only the dynamic limits and the operation bookkeeping change
//! selector state, and both take `&mut self`.

use crate::analysis::{PerformanceMetrics, SquashAnalysis, TrackAnalysis};
use crate::config::{CostModel, LimitConfig, LimitMode, MAX_TRACK_LIMIT, MIN_TRACK_LIMIT};
use crate::error::{Error, Result};
use crate::source::{SystemMonitor, TrackSource};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

/// Analysis timings kept for [`ResourceSelector::average_analysis_time`].
const ANALYSIS_HISTORY: usize = 50;
/// CPU load above which the track limit drops.
const HIGH_CPU_LOAD: f32 = 0.8;
/// CPU load below which the full track limit returns.
const LOW_CPU_LOAD: f32 = 0.3;
/// Hard CPU ceiling for [`LimitMode::PerformanceBased`].
const PERFORMANCE_CPU_CEILING: f32 = 0.9;

pub struct ResourceSelector {
    config: LimitConfig,
    cost: CostModel,
    monitor: Option<Box<dyn SystemMonitor>>,
    effective_track_limit: usize,
    effective_memory_kb: u32,
    metrics: PerformanceMetrics,
    analysis_times: Mutex<VecDeque<Duration>>,
}

impl Default for ResourceSelector {
    fn default() -> Self {
        Self::new(LimitConfig::default())
    }
}

impl ResourceSelector {
    pub fn new(config: LimitConfig) -> Self {
        let config = config.sanitized();
        let mut selector = Self {
            effective_track_limit: config.max_tracks,
            effective_memory_kb: config.max_memory_kb,
            config,
            cost: CostModel::default(),
            monitor: None,
            metrics: PerformanceMetrics::default(),
            analysis_times: Mutex::new(VecDeque::with_capacity(ANALYSIS_HISTORY)),
        };
        selector.refresh_dynamic_limits();
        selector
    }

    pub fn with_monitor(mut self, monitor: impl SystemMonitor + 'static) -> Self {
        self.set_monitor(monitor);
        self
    }

    pub fn with_cost_model(mut self, cost: CostModel) -> Self {
        self.cost = cost;
        self
    }

    // -- Configuration --------------------------------------------------------

    pub fn config(&self) -> &LimitConfig {
        &self.config
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    /// Replace the configuration. Out-of-range values are clamped.
    pub fn set_config(&mut self, config: LimitConfig) {
        self.config = config.sanitized();
        self.refresh_dynamic_limits();
    }

    pub fn set_max_tracks(&mut self, max_tracks: usize) {
        self.set_config(LimitConfig {
            max_tracks,
            ..self.config
        });
    }

    pub fn set_limit_mode(&mut self, mode: LimitMode) {
        self.config.mode = mode;
        self.refresh_dynamic_limits();
    }

    pub fn set_memory_limit(&mut self, max_memory_kb: u32) {
        self.set_config(LimitConfig {
            max_memory_kb,
            ..self.config
        });
    }

    pub fn set_cpu_limit(&mut self, max_cpu_percent: f32) {
        self.set_config(LimitConfig {
            max_cpu_percent,
            ..self.config
        });
    }

    pub fn set_monitor(&mut self, monitor: impl SystemMonitor + 'static) {
        self.set_boxed_monitor(Box::new(monitor));
    }

    pub fn set_boxed_monitor(&mut self, monitor: Box<dyn SystemMonitor>) {
        self.monitor = Some(monitor);
        self.refresh_dynamic_limits();
    }

    // -- Dynamic limits -----------------------------------------------------

    fn system_cpu_load(&self) -> f32 {
        self.monitor.as_ref().map_or(0.5, |m| m.cpu_load())
    }

    fn system_memory_kb(&self) -> u32 {
        self.monitor
            .as_ref()
            .map_or(self.config.max_memory_kb / 2, |m| m.memory_usage_kb())
    }

    /// Re-read the system monitor and recompute the effective limits.
    ///
    /// Load above 80% drops the track limit to 60% of the maximum, load
    /// below 30% restores it. Memory use above 80% of the ceiling scales
    /// the track limit and memory ceiling by 0.75.
    pub fn refresh_dynamic_limits(&mut self) {
        let max = self.config.max_tracks;
        self.effective_memory_kb = self.config.max_memory_kb;
        if !self.config.enable_dynamic_adjustment {
            self.effective_track_limit = max;
            return;
        }

        let cpu = self.system_cpu_load();
        let mut limit = if cpu > HIGH_CPU_LOAD {
            ((max as f32 * 0.6) as usize).max(MIN_TRACK_LIMIT)
        } else if cpu < LOW_CPU_LOAD {
            max
        } else {
            // Mid load keeps the previous limit
            self.effective_track_limit.clamp(MIN_TRACK_LIMIT, max)
        };

        let memory = self.system_memory_kb();
        if memory as f32 > self.config.max_memory_kb as f32 * 0.8 {
            limit = ((limit as f32 * 0.75) as usize).max(MIN_TRACK_LIMIT);
            self.effective_memory_kb = (self.config.max_memory_kb as f32 * 0.75) as u32;
        }

        if limit != self.effective_track_limit {
            debug!(
                "effective track limit {} -> {} (cpu {:.2}, memory {} KB)",
                self.effective_track_limit, limit, cpu, memory
            );
        }
        self.effective_track_limit = limit.min(MAX_TRACK_LIMIT);
    }

    pub fn effective_track_limit(&self) -> usize {
        self.effective_track_limit
    }

    pub fn effective_memory_limit_kb(&self) -> u32 {
        match self.config.mode {
            LimitMode::DynamicLimit => self.effective_memory_kb,
            _ => self.config.max_memory_kb,
        }
    }

    pub fn is_dynamic_limiting_active(&self) -> bool {
        self.config.enable_dynamic_adjustment && self.effective_track_limit != self.config.max_tracks
    }

    // -- Analysis -------------------------------------------------------------

    /// Sorted, de-duplicated tracks below 16.
    fn sanitize_tracks(tracks: &[usize]) -> Vec<usize> {
        let mut tracks: Vec<usize> = tracks.iter().copied().filter(|&t| t < MAX_TRACK_LIMIT).collect();
        tracks.sort_unstable();
        tracks.dedup();
        tracks
    }

    fn sanitize_steps(source: &impl TrackSource, start: usize, end: usize) -> RangeInclusive<usize> {
        let last = source.step_capacity().saturating_sub(1);
        let end = end.max(start).min(last);
        start.min(end)..=end
    }

    /// Cost estimate for one track over `start_step..=end_step`.
    pub fn analyze_track(
        &self,
        source: &impl TrackSource,
        track: usize,
        start_step: usize,
        end_step: usize,
    ) -> TrackAnalysis {
        let steps = Self::sanitize_steps(source, start_step, end_step);
        let active_steps = source.active_steps(track, steps);
        let effect_count = source.effect_count(track);
        let complexity = CostModel::complexity(active_steps, effect_count);

        TrackAnalysis {
            track,
            active_steps,
            effect_count,
            modulation_estimate: active_steps / 4,
            cpu_load: self.cost.track_cpu_load(active_steps, effect_count),
            memory_kb: self.cost.track_memory_kb(active_steps),
            complexity,
            priority: source.priority(track),
            is_recommended: complexity <= 0.8 && active_steps > 0,
        }
    }

    /// Analyse squashing `tracks` over `start_step..=end_step`.
    pub fn analyze_squash_operation(
        &self,
        source: &impl TrackSource,
        tracks: &[usize],
        start_step: usize,
        end_step: usize,
    ) -> SquashAnalysis {
        let started = Instant::now();
        let tracks = Self::sanitize_tracks(tracks);
        let steps = Self::sanitize_steps(source, start_step, end_step);

        let analyses: Vec<TrackAnalysis> = tracks
            .iter()
            .map(|&t| self.analyze_track(source, t, *steps.start(), *steps.end()))
            .collect();

        let mut analysis = SquashAnalysis {
            total_memory_kb: analyses.iter().map(|t| t.memory_kb).sum(),
            total_cpu_load: analyses.iter().map(|t| t.cpu_load).sum(),
            tracks: analyses,
            ..Default::default()
        };
        analysis.estimated_processing_ms = self
            .cost
            .processing_time_ms(analysis.total_memory_kb, analysis.total_cpu_load);
        analysis.within_limits = self.is_operation_allowed(&analysis);

        if !analysis.within_limits || tracks.len() > self.config.warning_threshold {
            analysis.requires_optimization = true;
            analysis.recommended_tracks =
                Self::top_by_score(&analysis.tracks, self.config.recommended_tracks);
            if tracks.len() > self.effective_track_limit {
                analysis.alternative_selection =
                    Self::top_by_score(&analysis.tracks, self.effective_track_limit);
            }
            analysis.recommendation = self.recommendation_text(&analysis);
            analysis.warning = Some(if analysis.within_limits {
                "Performance optimization recommended".to_string()
            } else {
                "Operation exceeds performance limits".to_string()
            });
        } else {
            analysis.recommended_tracks = tracks;
        }
        analysis.warnings = self.warning_messages(&analysis);

        self.record_analysis_time(started.elapsed());
        analysis
    }

    fn top_by_score(analyses: &[TrackAnalysis], count: usize) -> Vec<usize> {
        let mut ranked: Vec<&TrackAnalysis> = analyses.iter().collect();
        // Stable: ties keep ascending track order
        ranked.sort_by(|a, b| b.score().total_cmp(&a.score()));
        ranked.into_iter().take(count).map(|t| t.track).collect()
    }

    /// Up to `max_tracks` of `tracks`, best score first. Returns the input
    /// unchanged when it already fits.
    pub fn select_optimal_tracks(
        &self,
        source: &impl TrackSource,
        tracks: &[usize],
        start_step: usize,
        end_step: usize,
        max_tracks: usize,
    ) -> Vec<usize> {
        let tracks = Self::sanitize_tracks(tracks);
        if tracks.len() <= max_tracks {
            return tracks;
        }
        let analyses: Vec<TrackAnalysis> = tracks
            .iter()
            .map(|&t| self.analyze_track(source, t, start_step, end_step))
            .collect();
        Self::top_by_score(&analyses, max_tracks)
    }

    /// Least complex first.
    pub fn rank_tracks_by_complexity(
        &self,
        source: &impl TrackSource,
        tracks: &[usize],
        start_step: usize,
        end_step: usize,
    ) -> Vec<usize> {
        let mut ranked: Vec<(usize, f32)> = Self::sanitize_tracks(tracks)
            .into_iter()
            .map(|t| (t, self.analyze_track(source, t, start_step, end_step).complexity))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.into_iter().map(|(t, _)| t).collect()
    }

    /// Highest priority first.
    pub fn rank_tracks_by_priority(&self, source: &impl TrackSource, tracks: &[usize]) -> Vec<usize> {
        let mut ranked = Self::sanitize_tracks(tracks);
        ranked.sort_by_key(|&t| std::cmp::Reverse(source.priority(t)));
        ranked
    }

    /// Greedily take the least complex tracks while the summed complexity
    /// stays within `budget`.
    pub fn select_tracks_by_complexity_budget(
        &self,
        source: &impl TrackSource,
        tracks: &[usize],
        start_step: usize,
        end_step: usize,
        budget: f32,
    ) -> Vec<usize> {
        let mut used = 0.0;
        let mut selected = Vec::new();
        for track in self.rank_tracks_by_complexity(source, tracks, start_step, end_step) {
            let complexity = self.analyze_track(source, track, start_step, end_step).complexity;
            if used + complexity <= budget {
                used += complexity;
                selected.push(track);
            }
        }
        selected
    }

    pub fn estimate_memory_usage(
        &self,
        source: &impl TrackSource,
        tracks: &[usize],
        start_step: usize,
        end_step: usize,
    ) -> u32 {
        Self::sanitize_tracks(tracks)
            .into_iter()
            .map(|t| self.analyze_track(source, t, start_step, end_step).memory_kb)
            .sum()
    }

    pub fn estimate_cpu_load(
        &self,
        source: &impl TrackSource,
        tracks: &[usize],
        start_step: usize,
        end_step: usize,
    ) -> f32 {
        Self::sanitize_tracks(tracks)
            .into_iter()
            .map(|t| self.analyze_track(source, t, start_step, end_step).cpu_load)
            .sum()
    }

    pub fn estimate_processing_time(
        &self,
        source: &impl TrackSource,
        tracks: &[usize],
        start_step: usize,
        end_step: usize,
    ) -> Duration {
        let memory = self.estimate_memory_usage(source, tracks, start_step, end_step);
        let cpu = self.estimate_cpu_load(source, tracks, start_step, end_step);
        Duration::from_millis(self.cost.processing_time_ms(memory, cpu) as u64)
    }

    /// Whether the active policy admits `analysis`.
    pub fn is_operation_allowed(&self, analysis: &SquashAnalysis) -> bool {
        let tracks_ok = analysis.track_count() <= self.effective_track_limit;
        let memory_ok = analysis.total_memory_kb <= self.effective_memory_limit_kb();
        let cpu_ok = analysis.total_cpu_load <= self.config.max_cpu_load();

        if !self.config.mode.is_enforcing() {
            return true;
        }
        match self.config.mode {
            LimitMode::PerformanceBased => {
                analysis.total_cpu_load <= PERFORMANCE_CPU_CEILING && memory_ok
            }
            _ => tracks_ok && memory_ok && cpu_ok,
        }
    }

    /// `Ok` when the policy admits `analysis`. Rejections are counted.
    pub fn ensure_allowed(&mut self, analysis: &SquashAnalysis) -> Result<()> {
        if analysis.tracks.is_empty() {
            self.record_operation_rejected("no tracks selected");
            return Err(Error::EmptySelection);
        }
        if analysis.within_limits {
            return Ok(());
        }
        let reason = if analysis.recommendation.is_empty() {
            self.format_resource_usage(analysis.total_memory_kb, analysis.total_cpu_load)
        } else {
            analysis.recommendation.clone()
        };
        self.record_operation_rejected(&reason);
        Err(Error::LimitExceeded(reason))
    }

    // -- Reporting ------------------------------------------------------------

    pub fn warning_messages(&self, analysis: &SquashAnalysis) -> Vec<String> {
        let mut warnings = Vec::new();
        if analysis.track_count() > self.config.warning_threshold {
            warnings.push("High track count may impact performance".to_string());
        }
        if analysis.total_memory_kb as f32 > self.config.max_memory_kb as f32 * 0.8 {
            warnings.push("High memory usage detected".to_string());
        }
        if analysis.total_cpu_load > self.config.max_cpu_load() * 0.8 {
            warnings.push("High CPU load estimated".to_string());
        }
        warnings
    }

    pub fn optimization_suggestions(&self, analysis: &SquashAnalysis) -> Vec<String> {
        if !analysis.requires_optimization {
            return Vec::new();
        }
        vec![
            format!(
                "Consider reducing track count to {}",
                self.config.recommended_tracks
            ),
            "Focus on tracks with highest priority".to_string(),
            "Remove tracks with minimal audio content".to_string(),
        ]
    }

    pub fn format_resource_usage(&self, memory_kb: u32, cpu_load: f32) -> String {
        format!("Memory: {}KB, CPU: {}%", memory_kb, (cpu_load * 100.0) as i32)
    }

    /// 1-based track list for display.
    pub fn format_recommended_selection(&self, tracks: &[usize]) -> String {
        if tracks.is_empty() {
            return "No tracks recommended".to_string();
        }
        let list: Vec<String> = tracks.iter().map(|t| (t + 1).to_string()).collect();
        format!("Recommended tracks: {}", list.join(", "))
    }

    fn recommendation_text(&self, analysis: &SquashAnalysis) -> String {
        let mut text = String::new();
        if analysis.track_count() > self.effective_track_limit {
            text.push_str(&format!(
                "Consider reducing from {} to {} tracks for optimal performance. ",
                analysis.track_count(),
                self.effective_track_limit
            ));
        }
        if analysis.total_cpu_load > self.config.max_cpu_load() {
            text.push_str("High CPU usage expected. ");
        }
        if !analysis.recommended_tracks.is_empty() {
            text.push_str(&self.format_recommended_selection(&analysis.recommended_tracks));
        }
        text
    }

    // -- Bookkeeping ----------------------------------------------------------

    fn record_analysis_time(&self, elapsed: Duration) {
        let mut times = self.analysis_times.lock();
        if times.len() >= ANALYSIS_HISTORY {
            times.pop_front();
        }
        times.push_back(elapsed);
    }

    /// Mean of recent analysis timings.
    pub fn average_analysis_time(&self) -> Duration {
        let times = self.analysis_times.lock();
        if times.is_empty() {
            return Duration::ZERO;
        }
        times.iter().sum::<Duration>() / times.len() as u32
    }

    /// Fold a finished operation into the running averages.
    pub fn record_operation_complete(
        &mut self,
        success: bool,
        elapsed: Duration,
        memory_kb: u32,
        cpu_load: f32,
    ) {
        let m = &mut self.metrics;
        if !success {
            m.failed_operations += 1;
            return;
        }
        m.successful_operations += 1;
        let n = m.successful_operations as f32;
        let ms = elapsed.as_secs_f32() * 1000.0;
        m.average_processing_ms += (ms - m.average_processing_ms) / n;
        m.average_memory_kb += (memory_kb as f32 - m.average_memory_kb) / n;
        m.average_cpu_load += (cpu_load - m.average_cpu_load) / n;
        info!(
            "squash operation complete in {:.0} ms ({})",
            ms,
            self.format_resource_usage(memory_kb, cpu_load)
        );
    }

    /// Count an operation that started despite warnings.
    pub fn record_operation_admitted(&mut self, analysis: &SquashAnalysis) {
        if !analysis.warnings.is_empty() {
            self.metrics.warning_operations += 1;
        }
    }

    pub fn record_operation_rejected(&mut self, reason: &str) {
        warn!("squash operation rejected: {reason}");
        self.metrics.rejected_operations += 1;
        self.metrics.last_rejection = Some(reason.to_string());
    }

    pub fn performance_metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn reset_performance_metrics(&mut self) {
        self.metrics = PerformanceMetrics::default();
        self.analysis_times.lock().clear();
    }
}
