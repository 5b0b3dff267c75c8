//! Bounded pool of compressed region backups.

use crate::codec::{self, RegionSnapshot};
use crate::error::{Error, Result};
use crate::pattern::Pattern;
use crate::selection::SelectionBounds;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::SystemTime;

/// Backups kept before the oldest is evicted.
pub const DEFAULT_MAX_BACKUPS: usize = 10;
/// Compressed bytes kept before the oldest is evicted.
pub const DEFAULT_MAX_BACKUP_BYTES: usize = 1024 * 1024;

/// Backup handle. Ids are never reused within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackupId(pub u64);

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backup-{}", self.0)
    }
}

/// Immutable snapshot of one region.
#[derive(Debug, Clone)]
pub struct PatternBackup {
    pub id: BackupId,
    pub bounds: SelectionBounds,
    pub created_at: SystemTime,
    pub label: String,
    pub uncompressed_size: usize,
    payload: Vec<u8>,
}

impl PatternBackup {
    pub fn compressed_size(&self) -> usize {
        self.payload.len()
    }

    pub fn snapshot(&self) -> Result<RegionSnapshot> {
        codec::decode(&self.payload)
    }
}

/// Oldest-first backup pool bounded by count and compressed bytes.
#[derive(Debug)]
pub struct BackupStore {
    backups: VecDeque<PatternBackup>,
    next_id: u64,
    max_count: usize,
    max_bytes: usize,
}

impl Default for BackupStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKUPS, DEFAULT_MAX_BACKUP_BYTES)
    }
}

impl BackupStore {
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            backups: VecDeque::new(),
            next_id: 1,
            max_count,
            max_bytes,
        }
    }

    /// Snapshot `bounds` of `pattern`. Does not prune.
    pub fn create(
        &mut self,
        pattern: &Pattern,
        bounds: &SelectionBounds,
        label: impl Into<String>,
    ) -> Result<BackupId> {
        let snapshot = RegionSnapshot::capture(pattern, bounds)?;
        let (payload, uncompressed_size) = codec::encode(&snapshot)?;

        let id = BackupId(self.next_id);
        self.next_id += 1;
        self.backups.push_back(PatternBackup {
            id,
            bounds: *bounds,
            created_at: SystemTime::now(),
            label: label.into(),
            uncompressed_size,
            payload,
        });
        Ok(id)
    }

    /// Write a backup back into `pattern`. The backup stays in the pool.
    pub fn restore(&self, id: BackupId, pattern: &mut Pattern) -> Result<SelectionBounds> {
        let backup = self.get(id).ok_or(Error::BackupNotFound(id))?;
        let snapshot = backup.snapshot()?;
        snapshot.apply(pattern)?;
        Ok(snapshot.bounds)
    }

    pub fn get(&self, id: BackupId) -> Option<&PatternBackup> {
        self.backups.iter().find(|b| b.id == id)
    }

    pub fn contains(&self, id: BackupId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: BackupId) -> Option<PatternBackup> {
        let index = self.backups.iter().position(|b| b.id == id)?;
        self.backups.remove(index)
    }

    pub fn clear(&mut self) {
        self.backups.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PatternBackup> {
        self.backups.iter()
    }

    pub fn len(&self) -> usize {
        self.backups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.backups.iter().map(PatternBackup::compressed_size).sum()
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn set_max_count(&mut self, max_count: usize) {
        self.max_count = max_count;
    }

    pub fn set_max_bytes(&mut self, max_bytes: usize) {
        self.max_bytes = max_bytes;
    }

    fn over_limits(&self) -> bool {
        self.backups.len() > self.max_count || self.total_bytes() > self.max_bytes
    }

    /// Evict oldest-first until both ceilings hold, skipping pinned backups.
    ///
    /// Pinned backups are never evicted, so the pool may stay over its
    /// ceilings while they are held. Returns the evicted ids.
    pub fn prune(&mut self, is_pinned: impl Fn(BackupId) -> bool) -> Vec<BackupId> {
        let mut evicted = Vec::new();
        let mut index = 0;
        while self.over_limits() && index < self.backups.len() {
            if is_pinned(self.backups[index].id) {
                index += 1;
                continue;
            }
            if let Some(backup) = self.backups.remove(index) {
                evicted.push(backup.id);
            }
        }
        if !evicted.is_empty() {
            debug!("pruned {} pattern backup(s)", evicted.len());
        }
        if self.over_limits() {
            debug!(
                "backup pool over limits with {} pinned backup(s)",
                self.backups.len()
            );
        }
        evicted
    }
}
