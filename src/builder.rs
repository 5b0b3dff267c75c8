//! Builder for SquashEngine

use crate::{Result, SquashEngine};
use squash_capture::{CaptureConfig, CaptureSession, ProcessingParams};
use squash_limiter::{CostModel, LimitConfig, LimitMode, ResourceSelector, SystemMonitor};
use squash_pattern::{Pattern, PatternTransaction, PatternValidator, ReplacementConfig};

/// Builder for configuring SquashEngine.
///
/// # Example
///
/// ```ignore
/// let engine = SquashEngine::builder()
///     .pattern(Pattern::new(8)?)
///     .capture_config(CaptureConfig::default().with_sample_rate(48000))
///     .max_tracks(6)
///     .limit_mode(LimitMode::StrictLimit)
///     .max_undo_depth(50)
///     .build()?;
/// ```
pub struct SquashEngineBuilder {
    pattern: Option<Pattern>,
    capture_config: CaptureConfig,
    processing_params: ProcessingParams,
    limit_config: LimitConfig,
    cost_model: CostModel,
    monitor: Option<Box<dyn SystemMonitor>>,
    validator: Option<Box<dyn PatternValidator>>,
    replacement_config: ReplacementConfig,
    max_backups: Option<usize>,
    max_backup_bytes: Option<usize>,
    max_undo_depth: Option<usize>,
}

impl Default for SquashEngineBuilder {
    fn default() -> Self {
        Self {
            pattern: None,
            capture_config: CaptureConfig::default(),
            processing_params: ProcessingParams::default(),
            limit_config: LimitConfig::default(),
            cost_model: CostModel::default(),
            monitor: None,
            validator: None,
            replacement_config: ReplacementConfig::default(),
            max_backups: None,
            max_backup_bytes: None,
            max_undo_depth: None,
        }
    }
}

impl SquashEngineBuilder {
    /// Pattern the engine edits.
    ///
    /// Default: 8 empty tracks of 16 steps
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture_config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.capture_config = self.capture_config.with_sample_rate(sample_rate);
        self
    }

    pub fn processing_params(mut self, params: ProcessingParams) -> Self {
        self.processing_params = params;
        self
    }

    pub fn limit_config(mut self, config: LimitConfig) -> Self {
        self.limit_config = config;
        self
    }

    /// Default: 6
    pub fn max_tracks(mut self, max_tracks: usize) -> Self {
        self.limit_config.max_tracks = max_tracks;
        self
    }

    /// Default: `WarningLimit`
    pub fn limit_mode(mut self, mode: LimitMode) -> Self {
        self.limit_config.mode = mode;
        self
    }

    pub fn cost_model(mut self, cost: CostModel) -> Self {
        self.cost_model = cost;
        self
    }

    /// Source of CPU and memory load for dynamic limits.
    pub fn monitor(mut self, monitor: impl SystemMonitor + 'static) -> Self {
        self.monitor = Some(Box::new(monitor));
        self
    }

    /// Replaces the standard region validator.
    pub fn validator(mut self, validator: impl PatternValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Defaults used by `commit_capture`.
    pub fn replacement_config(mut self, config: ReplacementConfig) -> Self {
        self.replacement_config = config;
        self
    }

    /// Default: 10
    pub fn max_backups(mut self, count: usize) -> Self {
        self.max_backups = Some(count);
        self
    }

    /// Default: 1 MiB
    pub fn max_backup_bytes(mut self, bytes: usize) -> Self {
        self.max_backup_bytes = Some(bytes);
        self
    }

    /// Default: 20
    pub fn max_undo_depth(mut self, depth: usize) -> Self {
        self.max_undo_depth = Some(depth);
        self
    }

    pub fn build(self) -> Result<SquashEngine> {
        let pattern = match self.pattern {
            Some(pattern) => pattern,
            None => Pattern::new(8)?,
        };

        let session = CaptureSession::new(self.capture_config, self.processing_params)?;

        let mut selector =
            ResourceSelector::new(self.limit_config).with_cost_model(self.cost_model);
        if let Some(monitor) = self.monitor {
            selector.set_boxed_monitor(monitor);
        }

        let mut transaction = PatternTransaction::new();
        if let Some(validator) = self.validator {
            transaction.set_boxed_validator(validator);
        }
        transaction.set_default_config(self.replacement_config);
        if let Some(count) = self.max_backups {
            transaction.set_max_backup_count(count);
        }
        if let Some(bytes) = self.max_backup_bytes {
            transaction.set_max_backup_bytes(bytes);
        }
        if let Some(depth) = self.max_undo_depth {
            transaction.set_max_undo_depth(depth);
        }

        Ok(SquashEngine::from_parts(
            pattern,
            selector,
            session,
            transaction,
        ))
    }
}
