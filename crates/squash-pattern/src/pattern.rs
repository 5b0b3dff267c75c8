//! Step pattern model.
//!
//! Every track stores [`MAX_STEPS`] cells regardless of the active length, so
//! shortening a pattern never loses data and regions past the length can be
//! backed up and restored exactly.

use crate::error::{Error, Result};
use crate::selection::SelectionBounds;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Maximum tracks per pattern.
pub const MAX_TRACKS: usize = 16;
/// Step capacity of every track.
pub const MAX_STEPS: usize = 256;
/// Active length of a new pattern.
pub const DEFAULT_LENGTH: usize = 16;

/// One sequencer cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub active: bool,
    /// MIDI note, 0-127.
    pub note: u8,
    /// 0-127.
    pub velocity: u8,
    pub accent: bool,
    pub slide: bool,
    /// Sampler slot fired by this step, set on sample triggers.
    pub sample_slot: Option<u8>,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            active: false,
            note: 60,
            velocity: 100,
            accent: false,
            slide: false,
            sample_slot: None,
        }
    }
}

impl Step {
    /// An active note step.
    pub fn note(note: u8, velocity: u8) -> Self {
        Self {
            active: true,
            note,
            velocity,
            ..Default::default()
        }
    }

    /// An active step firing a sampler slot.
    pub fn trigger(slot: u8, velocity: u8) -> Self {
        Self {
            active: true,
            velocity,
            sample_slot: Some(slot),
            ..Default::default()
        }
    }

    pub fn is_sample_trigger(&self) -> bool {
        self.active && self.sample_slot.is_some()
    }
}

/// Per-track settings that feed cost estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Insert effects on the track.
    pub effect_count: u8,
    /// Explicit scheduling priority; `None` derives it from the track index.
    pub priority: Option<u8>,
    pub muted: bool,
}

/// Multi-track step pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    tracks: Vec<Vec<Step>>,
    configs: Vec<TrackConfig>,
    length: usize,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            tracks: vec![vec![Step::default(); MAX_STEPS]; MAX_TRACKS],
            configs: vec![TrackConfig::default(); MAX_TRACKS],
            length: DEFAULT_LENGTH,
        }
    }
}

impl Pattern {
    /// Empty pattern with `num_tracks` tracks (1..=16) and the default length.
    pub fn new(num_tracks: usize) -> Result<Self> {
        if num_tracks == 0 || num_tracks > MAX_TRACKS {
            return Err(Error::InvalidSize(format!(
                "track count {num_tracks} outside 1..={MAX_TRACKS}"
            )));
        }
        Ok(Self {
            tracks: vec![vec![Step::default(); MAX_STEPS]; num_tracks],
            configs: vec![TrackConfig::default(); num_tracks],
            length: DEFAULT_LENGTH,
        })
    }

    pub fn with_length(mut self, length: usize) -> Result<Self> {
        self.set_length(length)?;
        Ok(self)
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Active length in steps.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn set_length(&mut self, length: usize) -> Result<()> {
        if length == 0 || length > MAX_STEPS {
            return Err(Error::InvalidSize(format!(
                "length {length} outside 1..={MAX_STEPS}"
            )));
        }
        self.length = length;
        Ok(())
    }

    fn check(&self, track: usize, step: usize) -> Result<()> {
        if track >= self.tracks.len() {
            return Err(Error::TrackOutOfRange(track));
        }
        if step >= MAX_STEPS {
            return Err(Error::StepOutOfRange(step));
        }
        Ok(())
    }

    /// Region fits inside this pattern's storage.
    pub fn check_bounds(&self, bounds: &SelectionBounds) -> Result<()> {
        if !bounds.is_valid() {
            return Err(Error::InvalidSelection(format!("inverted bounds ({bounds})")));
        }
        self.check(bounds.end_track, bounds.end_step)
    }

    pub fn step(&self, track: usize, step: usize) -> Option<&Step> {
        self.tracks.get(track)?.get(step)
    }

    pub fn step_mut(&mut self, track: usize, step: usize) -> Option<&mut Step> {
        self.tracks.get_mut(track)?.get_mut(step)
    }

    pub fn set_step(&mut self, track: usize, step: usize, value: Step) -> Result<()> {
        self.check(track, step)?;
        self.tracks[track][step] = value;
        Ok(())
    }

    pub fn set_note(&mut self, track: usize, step: usize, note: u8, velocity: u8) -> Result<()> {
        self.set_step(track, step, Step::note(note.min(127), velocity.min(127)))
    }

    pub fn clear_step(&mut self, track: usize, step: usize) -> Result<()> {
        self.set_step(track, step, Step::default())
    }

    pub fn clear_region(&mut self, bounds: &SelectionBounds) -> Result<()> {
        self.check_bounds(bounds)?;
        for row in &mut self.tracks[bounds.tracks()] {
            row[bounds.steps()].fill(Step::default());
        }
        Ok(())
    }

    /// Active steps of `track` within `steps`, clamped to storage.
    pub fn count_active_steps(&self, track: usize, steps: RangeInclusive<usize>) -> usize {
        let Some(row) = self.tracks.get(track) else {
            return 0;
        };
        let end = (*steps.end()).min(MAX_STEPS - 1);
        if *steps.start() > end {
            return 0;
        }
        row[*steps.start()..=end].iter().filter(|s| s.active).count()
    }

    /// No active step within the active length.
    pub fn is_track_empty(&self, track: usize) -> bool {
        self.count_active_steps(track, 0..=self.length - 1) == 0
    }

    /// Active steps across all tracks within the active length.
    pub fn active_step_count(&self) -> usize {
        (0..self.num_tracks())
            .map(|t| self.count_active_steps(t, 0..=self.length - 1))
            .sum()
    }

    /// Cells of `bounds`, track-major.
    pub fn region_cells(&self, bounds: &SelectionBounds) -> Result<Vec<Step>> {
        self.check_bounds(bounds)?;
        let mut cells = Vec::with_capacity(bounds.total_cells());
        for row in &self.tracks[bounds.tracks()] {
            cells.extend_from_slice(&row[bounds.steps()]);
        }
        Ok(cells)
    }

    /// Overwrite `bounds` with cells laid out as [`Pattern::region_cells`] returns them.
    pub fn write_region(&mut self, bounds: &SelectionBounds, cells: &[Step]) -> Result<()> {
        self.check_bounds(bounds)?;
        if cells.len() != bounds.total_cells() {
            return Err(Error::InvalidSelection(format!(
                "{} cells for a {}-cell region",
                cells.len(),
                bounds.total_cells()
            )));
        }
        let width = bounds.step_count();
        for (row, chunk) in self.tracks[bounds.tracks()]
            .iter_mut()
            .zip(cells.chunks_exact(width))
        {
            row[bounds.steps()].copy_from_slice(chunk);
        }
        Ok(())
    }

    pub fn track_config(&self, track: usize) -> Option<&TrackConfig> {
        self.configs.get(track)
    }

    pub fn track_config_mut(&mut self, track: usize) -> Option<&mut TrackConfig> {
        self.configs.get_mut(track)
    }

    pub fn set_track_config(&mut self, track: usize, config: TrackConfig) -> Result<()> {
        let slot = self
            .configs
            .get_mut(track)
            .ok_or(Error::TrackOutOfRange(track))?;
        *slot = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pattern_is_empty() {
        let p = Pattern::new(4).unwrap();
        assert_eq!(p.num_tracks(), 4);
        assert_eq!(p.length(), DEFAULT_LENGTH);
        assert_eq!(p.active_step_count(), 0);
        assert!(p.is_track_empty(0));
        assert!(Pattern::new(0).is_err());
        assert!(Pattern::new(17).is_err());
    }

    #[test]
    fn test_length_range() {
        let mut p = Pattern::new(1).unwrap();
        assert!(p.set_length(0).is_err());
        assert!(p.set_length(257).is_err());
        p.set_length(256).unwrap();
        assert_eq!(p.length(), 256);
    }

    #[test]
    fn test_active_steps_respect_length() {
        let mut p = Pattern::new(2).unwrap();
        p.set_note(0, 0, 36, 100).unwrap();
        p.set_note(0, 20, 36, 100).unwrap();
        assert_eq!(p.count_active_steps(0, 0..=15), 1);
        assert_eq!(p.count_active_steps(0, 0..=300), 2);
        assert_eq!(p.active_step_count(), 1);
        assert!(p.is_track_empty(1));
        assert_eq!(p.count_active_steps(9, 0..=15), 0);
    }

    #[test]
    fn test_region_cells_round_trip() {
        let mut p = Pattern::new(4).unwrap();
        p.set_note(1, 2, 40, 90).unwrap();
        p.set_note(2, 3, 41, 80).unwrap();
        let bounds = SelectionBounds::new(1, 2, 2, 3);

        let cells = p.region_cells(&bounds).unwrap();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], Step::note(40, 90));
        assert_eq!(cells[3], Step::note(41, 80));

        p.clear_region(&bounds).unwrap();
        assert_eq!(p.active_step_count(), 0);
        p.write_region(&bounds, &cells).unwrap();
        assert_eq!(p.step(2, 3), Some(&Step::note(41, 80)));
        assert!(p.write_region(&bounds, &cells[..3]).is_err());
    }

    #[test]
    fn test_out_of_range_access() {
        let mut p = Pattern::new(2).unwrap();
        assert!(matches!(
            p.set_step(2, 0, Step::default()),
            Err(Error::TrackOutOfRange(2))
        ));
        assert!(matches!(
            p.clear_step(0, MAX_STEPS),
            Err(Error::StepOutOfRange(_))
        ));
        assert!(p.clear_region(&SelectionBounds::new(0, 1, 3, 2)).is_err());
        assert!(p.step(5, 0).is_none());
    }
}
