//! Rectangular pattern regions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Inclusive track and step range of a pattern region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SelectionBounds {
    pub start_track: usize,
    pub end_track: usize,
    pub start_step: usize,
    pub end_step: usize,
}

impl SelectionBounds {
    pub fn new(start_track: usize, end_track: usize, start_step: usize, end_step: usize) -> Self {
        Self {
            start_track,
            end_track,
            start_step,
            end_step,
        }
    }

    /// Start does not exceed end on either axis.
    pub fn is_valid(&self) -> bool {
        self.start_track <= self.end_track && self.start_step <= self.end_step
    }

    pub fn track_count(&self) -> usize {
        if self.is_valid() {
            self.end_track - self.start_track + 1
        } else {
            0
        }
    }

    pub fn step_count(&self) -> usize {
        if self.is_valid() {
            self.end_step - self.start_step + 1
        } else {
            0
        }
    }

    pub fn total_cells(&self) -> usize {
        self.track_count() * self.step_count()
    }

    pub fn contains(&self, track: usize, step: usize) -> bool {
        self.tracks().contains(&track) && self.steps().contains(&step)
    }

    pub fn tracks(&self) -> RangeInclusive<usize> {
        self.start_track..=self.end_track
    }

    pub fn steps(&self) -> RangeInclusive<usize> {
        self.start_step..=self.end_step
    }
}

impl fmt::Display for SelectionBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tracks {}-{}, steps {}-{}",
            self.start_track, self.end_track, self.start_step, self.end_step
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_inclusive() {
        let sel = SelectionBounds::new(0, 3, 0, 15);
        assert!(sel.is_valid());
        assert_eq!(sel.track_count(), 4);
        assert_eq!(sel.step_count(), 16);
        assert_eq!(sel.total_cells(), 64);
        assert!(sel.contains(3, 15));
        assert!(!sel.contains(4, 0));
    }

    #[test]
    fn test_inverted_bounds_are_empty() {
        let sel = SelectionBounds::new(2, 1, 0, 3);
        assert!(!sel.is_valid());
        assert_eq!(sel.total_cells(), 0);
        assert_eq!(sel.to_string(), "tracks 2-1, steps 0-3");
    }
}
