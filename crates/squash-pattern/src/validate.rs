//! Pattern content validation.

use crate::pattern::{Pattern, MAX_STEPS, MAX_TRACKS};
use crate::selection::SelectionBounds;

/// Selections longer than this draw a warning.
pub const LONG_SELECTION_STEPS: usize = 64;
/// Selections wider than this draw a warning.
pub const WIDE_SELECTION_TRACKS: usize = 8;

/// Outcome of validating a region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub total_steps: usize,
    pub total_tracks: usize,
    pub has_empty_tracks: bool,
    pub has_long_pattern: bool,
}

impl ValidationReport {
    pub fn new(selection: &SelectionBounds) -> Self {
        Self {
            is_valid: true,
            total_steps: selection.step_count(),
            total_tracks: selection.track_count(),
            ..Default::default()
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// First error, for result messages.
    pub fn summary(&self) -> String {
        self.errors
            .first()
            .cloned()
            .unwrap_or_else(|| "valid".to_string())
    }
}

/// Checks a region of a pattern before or after a mutation.
pub trait PatternValidator: Send {
    fn validate(&self, pattern: &Pattern, selection: &SelectionBounds) -> ValidationReport;
}

impl<F> PatternValidator for F
where
    F: Fn(&Pattern, &SelectionBounds) -> ValidationReport + Send,
{
    fn validate(&self, pattern: &Pattern, selection: &SelectionBounds) -> ValidationReport {
        self(pattern, selection)
    }
}

/// Bounds and cell-level checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardValidator;

impl StandardValidator {
    /// Bounds only: ordering, track range, step capacity.
    pub fn check_bounds(pattern: &Pattern, selection: &SelectionBounds, report: &mut ValidationReport) {
        if !selection.is_valid() {
            report.error(format!("Invalid selection bounds ({selection})"));
            return;
        }
        if selection.track_count() > MAX_TRACKS {
            report.error("Too many tracks selected");
        }
        if selection.end_track >= pattern.num_tracks() {
            report.error(format!(
                "Track {} out of range (pattern has {})",
                selection.end_track,
                pattern.num_tracks()
            ));
        }
        if selection.end_step >= MAX_STEPS {
            report.error(format!(
                "Step {} exceeds maximum pattern length {}",
                selection.end_step, MAX_STEPS
            ));
        }
    }
}

impl PatternValidator for StandardValidator {
    fn validate(&self, pattern: &Pattern, selection: &SelectionBounds) -> ValidationReport {
        let mut report = ValidationReport::new(selection);
        Self::check_bounds(pattern, selection, &mut report);
        if !report.is_valid {
            return report;
        }

        if report.total_steps > LONG_SELECTION_STEPS {
            report.warn("Pattern length exceeds recommended maximum");
            report.has_long_pattern = true;
        }
        if report.total_tracks > WIDE_SELECTION_TRACKS {
            report.warn("Large selection may contain empty tracks");
        }

        for track in selection.tracks() {
            if pattern.count_active_steps(track, selection.steps()) == 0 {
                report.has_empty_tracks = true;
            }
            for step in selection.steps() {
                let Some(cell) = pattern.step(track, step) else {
                    continue;
                };
                if cell.note > 127 || cell.velocity > 127 {
                    report.error(format!(
                        "Track {track} step {step}: note/velocity outside 0-127"
                    ));
                }
                if cell.sample_slot.is_some() && !cell.active {
                    report.warn(format!(
                        "Track {track} step {step}: inactive sample trigger"
                    ));
                }
            }
        }
        if report.has_empty_tracks {
            report.warn("Selection contains empty tracks");
        }
        report
    }
}
