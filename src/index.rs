use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, RecordingId};
use crate::error::{Error, Result};
use crate::hashing::{FingerprintKey, IndexedOccurrence, RecordingHashes};

const SNAPSHOT_VERSION: u32 = 1;

/// Read-only map from fingerprint key to the single occurrence it holds.
///
/// Every key keeps at most one occurrence: when several recordings (or
/// several pairs of one recording) produce the same key, the last one merged
/// wins and the earlier occurrences are gone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintIndex {
    entries: HashMap<FingerprintKey, IndexedOccurrence>,
}

/// Exclusive accumulator used while the index is being built.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    entries: HashMap<FingerprintKey, IndexedOccurrence>,
    recordings: usize,
    overwritten: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub overwritten: usize,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one recording's hashes. Keys already present are overwritten.
    pub fn merge(&mut self, hashes: RecordingHashes) -> MergeStats {
        let mut stats = MergeStats {
            inserted: 0,
            overwritten: 0,
        };
        for (key, occurrence) in hashes {
            match self.entries.insert(key, occurrence) {
                Some(_) => stats.overwritten += 1,
                None => stats.inserted += 1,
            }
        }
        self.recordings += 1;
        self.overwritten += stats.overwritten;
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> FingerprintIndex {
        debug!(
            keys = self.entries.len(),
            recordings = self.recordings,
            overwritten = self.overwritten,
            "fingerprint index built"
        );
        FingerprintIndex {
            entries: self.entries,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: FingerprintKey,
    time_offset: u32,
    recording_id: RecordingId,
}

impl FingerprintIndex {
    /// Merges the recordings in the order given; later recordings win on
    /// key collisions.
    pub fn build<I>(recordings: I) -> Self
    where
        I: IntoIterator<Item = RecordingHashes>,
    {
        let mut builder = IndexBuilder::new();
        for hashes in recordings {
            builder.merge(hashes);
        }
        builder.finish()
    }

    pub fn lookup(&self, key: FingerprintKey) -> Option<IndexedOccurrence> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FingerprintKey, IndexedOccurrence)> + '_ {
        self.entries.iter().map(|(key, occurrence)| (*key, *occurrence))
    }

    /// Every recording still referenced by at least one key.
    pub fn recording_ids(&self) -> BTreeSet<RecordingId> {
        self.entries.values().map(|o| o.recording_id).collect()
    }

    /// Fails with `UnknownRecording` if an occurrence points outside the catalog.
    pub fn check_catalog(&self, catalog: &Catalog) -> Result<()> {
        match self.recording_ids().into_iter().find(|id| !catalog.contains(*id)) {
            Some(id) => Err(Error::UnknownRecording(id)),
            None => Ok(()),
        }
    }

    /// Serializes the whole mapping. Entries are written in key order, so two
    /// indexes with the same contents persist to identical bytes.
    pub fn persist(&self) -> Result<Vec<u8>> {
        let mut entries: Vec<SnapshotEntry> = self
            .entries
            .iter()
            .map(|(key, occurrence)| SnapshotEntry {
                key: *key,
                time_offset: occurrence.time_offset,
                recording_id: occurrence.recording_id,
            })
            .collect();
        entries.sort_unstable_by_key(|entry| entry.key);

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries,
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    /// Rebuilds an index from `persist` output. Nothing is returned unless
    /// the whole blob is valid.
    pub fn restore(blob: &[u8]) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_slice(blob).map_err(|e| Error::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::UnsupportedSnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let mut entries = HashMap::with_capacity(snapshot.entries.len());
        for entry in snapshot.entries {
            let occurrence = IndexedOccurrence {
                time_offset: entry.time_offset,
                recording_id: entry.recording_id,
            };
            if entries.insert(entry.key, occurrence).is_some() {
                return Err(Error::Snapshot(format!("duplicate key {}", entry.key)));
            }
        }
        Ok(Self { entries })
    }
}
