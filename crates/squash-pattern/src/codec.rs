//! Backup payload encoding.
//!
//! Region cells are run-length packed at cell granularity and the result is
//! serialised with bincode. Pattern regions are mostly default cells, so a
//! large empty region packs to a handful of runs.

use crate::error::{Error, Result};
use crate::pattern::{Pattern, Step};
use crate::selection::SelectionBounds;
use serde::{Deserialize, Serialize};

/// Cells of one region plus the pattern length at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub bounds: SelectionBounds,
    pub length: usize,
    pub cells: Vec<Step>,
}

impl RegionSnapshot {
    pub fn capture(pattern: &Pattern, bounds: &SelectionBounds) -> Result<Self> {
        Ok(Self {
            bounds: *bounds,
            length: pattern.length(),
            cells: pattern.region_cells(bounds)?,
        })
    }

    /// Write the cells back and restore the length.
    pub fn apply(&self, pattern: &mut Pattern) -> Result<()> {
        pattern.write_region(&self.bounds, &self.cells)?;
        pattern.set_length(self.length)
    }
}

/// `count` repetitions of `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run<T> {
    pub count: u32,
    pub value: T,
}

/// On-the-wire form of a [`RegionSnapshot`].
#[derive(Serialize, Deserialize)]
struct PackedRegion {
    bounds: SelectionBounds,
    length: usize,
    runs: Vec<Run<Step>>,
}

/// Encoded snapshot and the size it would take unpacked.
pub fn encode(snapshot: &RegionSnapshot) -> Result<(Vec<u8>, usize)> {
    let unpacked = bincode::serialized_size(snapshot)? as usize;
    let packed = PackedRegion {
        bounds: snapshot.bounds,
        length: snapshot.length,
        runs: pack_runs(&snapshot.cells),
    };
    Ok((bincode::serialize(&packed)?, unpacked))
}

pub fn decode(payload: &[u8]) -> Result<RegionSnapshot> {
    let packed: PackedRegion = bincode::deserialize(payload)?;
    let cells = unpack_runs(&packed.runs, packed.bounds.total_cells())?;
    Ok(RegionSnapshot {
        bounds: packed.bounds,
        length: packed.length,
        cells,
    })
}

pub fn pack_runs<T: Copy + PartialEq>(items: &[T]) -> Vec<Run<T>> {
    let mut runs: Vec<Run<T>> = Vec::new();
    for &item in items {
        match runs.last_mut() {
            Some(run) if run.value == item && run.count < u32::MAX => run.count += 1,
            _ => runs.push(Run {
                count: 1,
                value: item,
            }),
        }
    }
    runs
}

/// Expand runs, which must cover exactly `expected` items.
pub fn unpack_runs<T: Copy>(runs: &[Run<T>], expected: usize) -> Result<Vec<T>> {
    let total: usize = runs.iter().map(|r| r.count as usize).sum();
    if total != expected {
        return Err(Error::CorruptBackup(format!(
            "runs cover {total} cells, region has {expected}"
        )));
    }
    let mut out = Vec::with_capacity(expected);
    for run in runs {
        if run.count == 0 {
            return Err(Error::CorruptBackup("zero-length run".into()));
        }
        out.extend(std::iter::repeat(run.value).take(run.count as usize));
    }
    Ok(out)
}
