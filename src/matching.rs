use std::collections::HashMap;

use crate::catalog::RecordingId;
use crate::hashing::QueryHashes;
use crate::index::FingerprintIndex;

/// A reference recording that shares keys with the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub recording_id: RecordingId,
    /// Votes for the most common `db_time - query_time` offset.
    pub mode_count: usize,
    /// The offset (in frames) that collected `mode_count` votes.
    pub offset: i64,
    /// Number of query keys that landed on this recording.
    pub matched_keys: usize,
}

/// Ranks the `top_n` best candidates for a hashed query.
///
/// For every query key found in the index the offset `db_time - query_time`
/// is voted into that recording's histogram. A genuine excerpt piles its
/// votes onto one offset; coincidental collisions scatter. Candidates are
/// ordered by mode count, descending, and then by recording id, ascending.
/// An empty result means no key matched and is not an error.
pub fn match_query(query: &QueryHashes, index: &FingerprintIndex, top_n: usize) -> Vec<Candidate> {
    let mut candidates = rank_candidates(query, index);
    candidates.truncate(top_n);
    candidates
}

/// Every candidate, fully ranked.
pub fn rank_candidates(query: &QueryHashes, index: &FingerprintIndex) -> Vec<Candidate> {
    let mut histograms: HashMap<RecordingId, HashMap<i64, usize>> = HashMap::new();

    for (key, query_occurrence) in query {
        let Some(db_occurrence) = index.lookup(*key) else {
            continue;
        };
        let time_diff = i64::from(db_occurrence.time_offset) - i64::from(query_occurrence.time_offset);
        *histograms
            .entry(db_occurrence.recording_id)
            .or_default()
            .entry(time_diff)
            .or_default() += 1;
    }

    let mut candidates: Vec<Candidate> = histograms
        .into_iter()
        .filter_map(|(recording_id, histogram)| {
            let matched_keys = histogram.values().sum();
            // highest count, smallest offset among equals
            let (offset, mode_count) = histogram
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))?;
            Some(Candidate {
                recording_id,
                mode_count,
                offset,
                matched_keys,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.mode_count
            .cmp(&a.mode_count)
            .then(a.recording_id.cmp(&b.recording_id))
    });
    candidates
}
