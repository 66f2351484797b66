use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::RecordingId;
use crate::peaks::Landmark;

/// Combinatorial hash of a landmark pair.
///
/// Packs `anchor_freq` (16 bits), `target_freq` (16 bits) and `time_delta`
/// (32 bits) into one `u64`. The packing is lossless: two pairs share a key
/// exactly when their (freq1, freq2, time_delta) triples are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintKey(u64);

impl FingerprintKey {
    pub fn new(anchor_freq: u16, target_freq: u16, time_delta: u32) -> Self {
        Self((u64::from(anchor_freq) << 48) | (u64::from(target_freq) << 32) | u64::from(time_delta))
    }

    pub fn anchor_freq(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub fn target_freq(self) -> u16 {
        (self.0 >> 32) as u16
    }

    pub fn time_delta(self) -> u32 {
        self.0 as u32
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for FingerprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.anchor_freq(), self.target_freq(), self.time_delta())
    }
}

/// Anchor time of a key produced while hashing a query clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOccurrence {
    pub time_offset: u32,
}

/// Anchor time of a key produced while hashing a reference recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedOccurrence {
    pub time_offset: u32,
    pub recording_id: RecordingId,
}

pub type QueryHashes = HashMap<FingerprintKey, QueryOccurrence>;
pub type RecordingHashes = HashMap<FingerprintKey, IndexedOccurrence>;

/// Hashes the landmarks of a query clip.
pub fn hash_query(landmarks: &[Landmark], target_zone: usize) -> QueryHashes {
    hash_pairs(landmarks, target_zone, |time_offset| QueryOccurrence { time_offset })
}

/// Hashes the landmarks of a reference recording.
pub fn hash_recording(
    landmarks: &[Landmark],
    target_zone: usize,
    recording_id: RecordingId,
) -> RecordingHashes {
    hash_pairs(landmarks, target_zone, |time_offset| IndexedOccurrence {
        time_offset,
        recording_id,
    })
}

/// Sorts by time, then frequency, and pairs every anchor with the next
/// `target_zone - 1` landmarks. A key produced twice keeps the occurrence of
/// the later pair.
fn hash_pairs<O>(
    landmarks: &[Landmark],
    target_zone: usize,
    occurrence: impl Fn(u32) -> O,
) -> HashMap<FingerprintKey, O> {
    let mut sorted = landmarks.to_vec();
    sorted.sort_by_key(|lm| (lm.time_frame, lm.freq_bin));

    let partners = target_zone.saturating_sub(1);
    // no anchor has more partners than there are landmarks after it
    let capacity = sorted.len().saturating_mul(partners.min(sorted.len()));
    let mut hashes = HashMap::with_capacity(capacity);

    for (i, anchor) in sorted.iter().enumerate() {
        for target in sorted.iter().skip(i + 1).take(partners) {
            let time_delta = target.time_frame - anchor.time_frame;
            let key = FingerprintKey::new(anchor.freq_bin, target.freq_bin, time_delta);
            hashes.insert(key, occurrence(anchor.time_frame));
        }
    }
    hashes
}
