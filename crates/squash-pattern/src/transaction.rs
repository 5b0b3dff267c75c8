//! Backup, replace, validate, then commit or roll back.
//!
//! [`PatternTransaction`] mutates a caller-owned [`Pattern`]. Every call ends
//! with the region either fully replaced or exactly as it was, and committed
//! replacements can be undone and redone.

use crate::backup::{BackupId, BackupStore, PatternBackup, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_BACKUP_BYTES};
use crate::codec::RegionSnapshot;
use crate::error::{Error, Result};
use crate::pattern::{Pattern, Step, MAX_STEPS};
use crate::selection::SelectionBounds;
use crate::validate::{PatternValidator, StandardValidator, ValidationReport};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Undo entries kept before the oldest is dropped.
pub const DEFAULT_MAX_UNDO_DEPTH: usize = 20;
/// Events queued per subscriber before new ones are dropped.
pub const PATTERN_EVENT_QUEUE_DEPTH: usize = 64;

/// How the region is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplacementType {
    /// Clear the whole region, then add the trigger.
    #[default]
    FullSelection,
    /// Add the trigger, leave everything else.
    SampleOnly,
    /// Same effect as `FullSelection`.
    ClearAndSample,
    /// Clear the target track's row only, then add the trigger.
    MergeWithSample,
    /// Add the trigger on top of the existing cell, keeping its note.
    OverlaySample,
}

impl ReplacementType {
    fn clears_region(self) -> bool {
        matches!(
            self,
            ReplacementType::FullSelection | ReplacementType::ClearAndSample
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplacementConfig {
    pub replacement_type: ReplacementType,
    /// Track receiving the trigger; `None` uses the selection's first track.
    pub target_track: Option<usize>,
    /// Keep the velocity of the cell the trigger replaces.
    pub preserve_velocity: bool,
    /// Grow the pattern when the selection runs past its length.
    pub adjust_pattern_length: bool,
    /// Run the validator on the region before mutating.
    pub validate_before_replace: bool,
    /// Run the validator on the result and roll back on failure.
    pub validate_after_replace: bool,
    pub create_backup: bool,
    /// Trigger velocity, 0.0-1.0.
    pub sample_velocity: f32,
    pub sample_slot: u8,
}

impl Default for ReplacementConfig {
    fn default() -> Self {
        Self {
            replacement_type: ReplacementType::FullSelection,
            target_track: None,
            preserve_velocity: false,
            adjust_pattern_length: true,
            validate_before_replace: true,
            validate_after_replace: true,
            create_backup: true,
            sample_velocity: 1.0,
            sample_slot: 0,
        }
    }
}

impl ReplacementConfig {
    pub fn sanitized(&self) -> Self {
        let sample_velocity = if self.sample_velocity.is_nan() {
            1.0
        } else {
            self.sample_velocity.clamp(0.0, 1.0)
        };
        Self {
            sample_velocity,
            ..*self
        }
    }

    fn trigger_velocity(&self) -> u8 {
        (self.sample_velocity * 127.0).round() as u8
    }
}

/// Outcome of one replacement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplacementResult {
    pub success: bool,
    pub backup_id: Option<BackupId>,
    pub affected_region: SelectionBounds,
    pub original_length: usize,
    pub new_length: usize,
    pub modified_tracks: Vec<usize>,
    /// Serialised size of the replaced cells.
    pub bytes_touched: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternEvent {
    BackupCreated(BackupId),
    PatternModified(SelectionBounds),
    ValidationFailed(ValidationReport),
    ReplacementComplete(ReplacementResult),
    /// An undo or redo entry could not be restored and was dropped.
    UndoUnavailable(BackupId),
}

/// Subscriber side of the transaction event channel.
pub struct PatternEvents {
    rx: Receiver<PatternEvent>,
}

impl PatternEvents {
    pub fn try_next(&self) -> Option<PatternEvent> {
        self.rx.try_recv().ok()
    }

    pub fn drain(&self) -> Vec<PatternEvent> {
        self.rx.try_iter().collect()
    }
}

/// Transactional region replacement with a shared backup pool and undo/redo.
pub struct PatternTransaction {
    store: BackupStore,
    undo_stack: VecDeque<BackupId>,
    redo_stack: Vec<BackupId>,
    max_undo_depth: usize,
    default_config: ReplacementConfig,
    validator: Box<dyn PatternValidator>,
    subscribers: Vec<Sender<PatternEvent>>,
}

impl Default for PatternTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternTransaction {
    pub fn new() -> Self {
        Self {
            store: BackupStore::new(DEFAULT_MAX_BACKUPS, DEFAULT_MAX_BACKUP_BYTES),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo_depth: DEFAULT_MAX_UNDO_DEPTH,
            default_config: ReplacementConfig::default(),
            validator: Box::new(StandardValidator),
            subscribers: Vec::new(),
        }
    }

    pub fn with_validator(mut self, validator: impl PatternValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn set_validator(&mut self, validator: impl PatternValidator + 'static) {
        self.validator = Box::new(validator);
    }

    pub fn set_boxed_validator(&mut self, validator: Box<dyn PatternValidator>) {
        self.validator = validator;
    }

    pub fn default_config(&self) -> &ReplacementConfig {
        &self.default_config
    }

    /// Defaults for [`PatternTransaction::replace_with_sample`] and
    /// [`PatternTransaction::clear_and_replace_with_sample`]. Velocity is clamped.
    pub fn set_default_config(&mut self, config: ReplacementConfig) {
        self.default_config = config.sanitized();
    }

    pub fn subscribe(&mut self) -> PatternEvents {
        let (tx, rx) = crossbeam_channel::bounded(PATTERN_EVENT_QUEUE_DEPTH);
        self.subscribers.push(tx);
        PatternEvents { rx }
    }

    fn emit(&mut self, event: PatternEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        self.subscribers
            .retain(|tx| !matches!(tx.try_send(event.clone()), Err(TrySendError::Disconnected(_))));
    }

    // -- Replacement --------------------------------------------------------

    /// Replace `selection` according to `config`.
    pub fn replace(
        &mut self,
        pattern: &mut Pattern,
        selection: &SelectionBounds,
        config: &ReplacementConfig,
    ) -> ReplacementResult {
        let config = config.sanitized();
        let mut result = ReplacementResult {
            affected_region: *selection,
            original_length: pattern.length(),
            new_length: pattern.length(),
            ..Default::default()
        };

        if let Err(message) = self.admit(pattern, selection, &config) {
            return self.finish_failed(result, message);
        }

        // Backup or in-memory snapshot for rollback
        let rollback = if config.create_backup {
            match self.create_backup(pattern, selection, "Pattern replacement") {
                Ok(id) => {
                    result.backup_id = Some(id);
                    Rollback::Backup(id)
                }
                Err(e) => {
                    return self.finish_failed(result, format!("Failed to create backup: {e}"));
                }
            }
        } else {
            match RegionSnapshot::capture(pattern, selection) {
                Ok(snapshot) => Rollback::Snapshot(Box::new(snapshot)),
                Err(e) => {
                    return self.finish_failed(result, format!("Failed to snapshot region: {e}"));
                }
            }
        };

        if let Err(e) = apply_replacement(pattern, selection, &config) {
            self.roll_back(pattern, &rollback);
            result.backup_id = None;
            return self.finish_failed(result, format!("Replacement failed: {e}"));
        }
        self.emit(PatternEvent::PatternModified(*selection));

        if config.validate_after_replace {
            let report = self.validator.validate(pattern, selection);
            if !report.is_valid {
                let message = format!(
                    "Pattern validation failed after replacement: {}",
                    report.summary()
                );
                self.emit(PatternEvent::ValidationFailed(report));
                self.roll_back(pattern, &rollback);
                self.emit(PatternEvent::PatternModified(*selection));
                result.backup_id = None;
                return self.finish_failed(result, message);
            }
        }

        if let Rollback::Backup(id) = rollback {
            self.push_undo(id);
        }

        let target = config.target_track.unwrap_or(selection.start_track);
        let mut modified: Vec<usize> = if config.replacement_type.clears_region() {
            selection.tracks().collect()
        } else {
            Vec::new()
        };
        if !modified.contains(&target) {
            modified.push(target);
            modified.sort_unstable();
        }

        result.success = true;
        result.new_length = pattern.length();
        result.modified_tracks = modified;
        result.bytes_touched = selection.total_cells() * std::mem::size_of::<Step>();
        info!(
            "replaced {} with sample slot {} on track {}",
            selection, config.sample_slot, target
        );
        self.emit(PatternEvent::ReplacementComplete(result.clone()));
        result
    }

    /// Add a trigger of `slot` without clearing.
    pub fn replace_with_sample(
        &mut self,
        pattern: &mut Pattern,
        selection: &SelectionBounds,
        slot: u8,
        target_track: Option<usize>,
    ) -> ReplacementResult {
        let config = ReplacementConfig {
            replacement_type: ReplacementType::SampleOnly,
            sample_slot: slot,
            target_track,
            ..self.default_config
        };
        self.replace(pattern, selection, &config)
    }

    /// Clear the region, then add a trigger of `slot`.
    pub fn clear_and_replace_with_sample(
        &mut self,
        pattern: &mut Pattern,
        selection: &SelectionBounds,
        slot: u8,
        target_track: Option<usize>,
    ) -> ReplacementResult {
        let config = ReplacementConfig {
            replacement_type: ReplacementType::ClearAndSample,
            sample_slot: slot,
            target_track,
            ..self.default_config
        };
        self.replace(pattern, selection, &config)
    }

    /// Checks that run before anything is touched.
    fn admit(
        &mut self,
        pattern: &Pattern,
        selection: &SelectionBounds,
        config: &ReplacementConfig,
    ) -> std::result::Result<(), String> {
        let report = self.validate_selection(pattern, selection);
        if !report.is_valid {
            let message = format!("Invalid selection bounds: {}", report.summary());
            self.emit(PatternEvent::ValidationFailed(report));
            return Err(message);
        }

        if selection.end_step >= pattern.length() && !config.adjust_pattern_length {
            return Err(format!(
                "Selection ends at step {} past pattern length {}",
                selection.end_step,
                pattern.length()
            ));
        }

        let target = config.target_track.unwrap_or(selection.start_track);
        if target >= pattern.num_tracks() {
            return Err(format!("Target track {target} out of range"));
        }

        if config.validate_before_replace {
            let report = self.validator.validate(pattern, selection);
            if !report.is_valid {
                let message = format!(
                    "Pattern validation failed before replacement: {}",
                    report.summary()
                );
                self.emit(PatternEvent::ValidationFailed(report));
                return Err(message);
            }
        }
        Ok(())
    }

    fn roll_back(&mut self, pattern: &mut Pattern, rollback: &Rollback) {
        let restored = match rollback {
            Rollback::Backup(id) => {
                let restored = self.store.restore(*id, pattern).map(|_| ());
                self.store.remove(*id);
                restored
            }
            Rollback::Snapshot(snapshot) => snapshot.apply(pattern),
        };
        match restored {
            Ok(()) => debug!("rolled back failed replacement"),
            Err(e) => warn!("rollback failed: {e}"),
        }
    }

    fn finish_failed(&mut self, mut result: ReplacementResult, message: String) -> ReplacementResult {
        warn!("pattern replacement failed: {message}");
        result.success = false;
        result.error = Some(message);
        self.emit(PatternEvent::ReplacementComplete(result.clone()));
        result
    }

    // -- Backups ------------------------------------------------------------

    /// Back up `selection` and prune the pool. Fails before any mutation.
    pub fn create_backup(
        &mut self,
        pattern: &Pattern,
        selection: &SelectionBounds,
        label: &str,
    ) -> Result<BackupId> {
        let id = self.store.create(pattern, selection, label)?;
        self.prune_keeping(Some(id));
        self.emit(PatternEvent::BackupCreated(id));
        debug!("created {id} for {selection}");
        Ok(id)
    }

    /// Write a backup back into `pattern`. The backup stays available.
    pub fn restore_backup(&mut self, pattern: &mut Pattern, id: BackupId) -> Result<()> {
        let bounds = self.store.restore(id, pattern)?;
        self.emit(PatternEvent::PatternModified(bounds));
        Ok(())
    }

    /// Drop a backup, and any undo/redo entry pointing at it.
    pub fn remove_backup(&mut self, id: BackupId) -> bool {
        self.undo_stack.retain(|&u| u != id);
        self.redo_stack.retain(|&r| r != id);
        self.store.remove(id).is_some()
    }

    /// Drop every backup and the undo/redo history.
    pub fn clear_all_backups(&mut self) {
        self.store.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Oldest first.
    pub fn backups(&self) -> impl Iterator<Item = &PatternBackup> {
        self.store.iter()
    }

    pub fn has_backup(&self, id: BackupId) -> bool {
        self.store.contains(id)
    }

    pub fn total_backup_bytes(&self) -> usize {
        self.store.total_bytes()
    }

    pub fn set_max_backup_count(&mut self, max_count: usize) {
        self.store.set_max_count(max_count);
        self.prune_keeping(None);
    }

    pub fn set_max_backup_bytes(&mut self, max_bytes: usize) {
        self.store.set_max_bytes(max_bytes);
        self.prune_keeping(None);
    }

    /// Prune, never evicting backups the history still points at.
    fn prune_keeping(&mut self, fresh: Option<BackupId>) {
        let undo = &self.undo_stack;
        let redo = &self.redo_stack;
        self.store
            .prune(|id| Some(id) == fresh || undo.contains(&id) || redo.contains(&id));
    }

    // -- Validation ---------------------------------------------------------

    /// Bounds checks only.
    pub fn validate_selection(&self, pattern: &Pattern, selection: &SelectionBounds) -> ValidationReport {
        let mut report = ValidationReport::new(selection);
        StandardValidator::check_bounds(pattern, selection, &mut report);
        report
    }

    /// Run the configured validator over the pattern's active area.
    pub fn validate_pattern(&self, pattern: &Pattern) -> ValidationReport {
        let all = SelectionBounds::new(0, pattern.num_tracks() - 1, 0, pattern.length() - 1);
        self.validator.validate(pattern, &all)
    }

    // -- Undo / redo ----------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn max_undo_depth(&self) -> usize {
        self.max_undo_depth
    }

    pub fn set_max_undo_depth(&mut self, depth: usize) {
        self.max_undo_depth = depth.max(1);
        self.trim_undo();
    }

    fn push_undo(&mut self, id: BackupId) {
        self.undo_stack.push_back(id);
        for stale in std::mem::take(&mut self.redo_stack) {
            self.store.remove(stale);
        }
        self.trim_undo();
    }

    fn trim_undo(&mut self) {
        while self.undo_stack.len() > self.max_undo_depth {
            if let Some(dropped) = self.undo_stack.pop_front() {
                self.store.remove(dropped);
            }
        }
    }

    /// Restore the state before the last committed replacement.
    ///
    /// The current state of that region is kept as a redo point.
    pub fn undo(&mut self, pattern: &mut Pattern) -> bool {
        let Some(id) = self.undo_stack.pop_back() else {
            return false;
        };
        match self.swap_with_backup(pattern, id, "Redo point") {
            Some(inverse) => {
                self.redo_stack.push(inverse);
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone replacement.
    pub fn redo(&mut self, pattern: &mut Pattern) -> bool {
        let Some(id) = self.redo_stack.pop() else {
            return false;
        };
        match self.swap_with_backup(pattern, id, "Undo point") {
            Some(inverse) => {
                self.undo_stack.push_back(inverse);
                self.trim_undo();
                true
            }
            None => false,
        }
    }

    /// Back up the region `id` covers, restore `id`, and consume it.
    /// Returns the new backup of the replaced state.
    fn swap_with_backup(&mut self, pattern: &mut Pattern, id: BackupId, label: &str) -> Option<BackupId> {
        let Some(bounds) = self.store.get(id).map(|b| b.bounds) else {
            warn!("{id} no longer available");
            self.emit(PatternEvent::UndoUnavailable(id));
            return None;
        };

        let inverse = match self.store.create(pattern, &bounds, label) {
            Ok(inverse) => inverse,
            Err(e) => {
                // Leave the entry usable
                warn!("failed to back up current state: {e}");
                return None;
            }
        };

        if let Err(e) = self.store.restore(id, pattern) {
            warn!("failed to restore {id}: {e}");
            self.store.remove(inverse);
            self.store.remove(id);
            self.emit(PatternEvent::UndoUnavailable(id));
            return None;
        }
        self.store.remove(id);
        self.prune_keeping(Some(inverse));
        self.emit(PatternEvent::BackupCreated(inverse));
        self.emit(PatternEvent::PatternModified(bounds));
        Some(inverse)
    }

    /// Forget undo/redo entries. Their backups become ordinary pool members.
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn estimated_memory_usage(&self) -> usize {
        self.store.total_bytes()
            + self.store.len() * std::mem::size_of::<PatternBackup>()
            + (self.undo_stack.len() + self.redo_stack.len()) * std::mem::size_of::<BackupId>()
    }
}

enum Rollback {
    Backup(BackupId),
    Snapshot(Box<RegionSnapshot>),
}

fn apply_replacement(
    pattern: &mut Pattern,
    selection: &SelectionBounds,
    config: &ReplacementConfig,
) -> Result<()> {
    let target = config.target_track.unwrap_or(selection.start_track);
    if selection.end_step >= pattern.length() {
        pattern.set_length((selection.end_step + 1).min(MAX_STEPS))?;
    }

    let existing = pattern
        .step(target, selection.start_step)
        .copied()
        .ok_or(Error::TrackOutOfRange(target))?;

    match config.replacement_type {
        ReplacementType::FullSelection | ReplacementType::ClearAndSample => {
            pattern.clear_region(selection)?;
        }
        ReplacementType::MergeWithSample => {
            let row = SelectionBounds::new(target, target, selection.start_step, selection.end_step);
            pattern.clear_region(&row)?;
        }
        ReplacementType::SampleOnly | ReplacementType::OverlaySample => {}
    }

    let velocity = if config.preserve_velocity && existing.active {
        existing.velocity
    } else {
        config.trigger_velocity()
    };
    let mut trigger = Step::trigger(config.sample_slot, velocity);
    if config.replacement_type == ReplacementType::OverlaySample && existing.active {
        trigger.note = existing.note;
        trigger.accent = existing.accent;
    }
    pattern.set_step(target, selection.start_step, trigger)
}
