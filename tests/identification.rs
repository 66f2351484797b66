mod common;

use std::collections::HashSet;

use common::{random_landmarks, seeded};
use landmark_matcher::config::PeakConfig;
use landmark_matcher::{
    extract_peaks, hash_query, hash_recording, match_query, FingerprintIndex, Landmark, RecordingId,
};
use ndarray::{s, Array2};
use rand::Rng;

const TARGET_ZONE: usize = 15;

fn tone_spectrogram(freq_bin: usize, frames: usize) -> Array2<f32> {
    let mut spectrogram = Array2::<f32>::zeros((64, frames));
    spectrogram.row_mut(freq_bin).fill(1.0);
    spectrogram
}

#[test]
fn tone_excerpt_is_matched_to_its_source() {
    let peaks = PeakConfig::default();
    let tones = [10, 30, 50].map(|bin| tone_spectrogram(bin, 1000));

    let index = FingerprintIndex::build(tones.iter().enumerate().map(|(id, spectrogram)| {
        let landmarks = extract_peaks(spectrogram, &peaks).unwrap();
        hash_recording(&landmarks, TARGET_ZONE, RecordingId(id as u32))
    }));

    // half of B, starting 200 frames in
    let excerpt = tones[1].slice(s![.., 200..700]).to_owned();
    let query_landmarks = extract_peaks(&excerpt, &peaks).unwrap();
    assert!(!query_landmarks.is_empty());

    let ranked = match_query(&hash_query(&query_landmarks, TARGET_ZONE), &index, 3);
    assert_eq!(ranked[0].recording_id, RecordingId(1));
    assert_eq!(ranked[0].mode_count, TARGET_ZONE - 1);
    assert_eq!(ranked.len(), 1);
}

#[test]
fn shifted_excerpt_votes_with_every_shared_key() {
    let mut rng = seeded(0x2545_F491_4F6C_DD1D);
    // unique frequency per landmark, so no key repeats inside a recording
    let mut time = 0u32;
    let reference: Vec<Landmark> = (0..400u16)
        .map(|i| {
            time += rng.random_range(1..=4);
            Landmark::new((i * 37) % 401, time)
        })
        .collect();
    let other: Vec<Landmark> = reference
        .iter()
        .map(|lm| Landmark::new(lm.freq_bin + 1000, lm.time_frame))
        .collect();

    let reference_hashes = hash_recording(&reference, TARGET_ZONE, RecordingId(0));
    let index = FingerprintIndex::build([
        reference_hashes.clone(),
        hash_recording(&other, TARGET_ZONE, RecordingId(1)),
    ]);

    let (start, end) = (300u32, 600u32);
    let excerpt: Vec<Landmark> = reference
        .iter()
        .filter(|lm| (start..end).contains(&lm.time_frame))
        .map(|lm| Landmark::new(lm.freq_bin, lm.time_frame - start))
        .collect();
    let query = hash_query(&excerpt, TARGET_ZONE);

    let shared = query
        .keys()
        .filter(|key| reference_hashes.contains_key(key))
        .count();
    assert!(shared > 0);

    let ranked = match_query(&query, &index, 3);
    assert_eq!(ranked[0].recording_id, RecordingId(0));
    assert_eq!(ranked[0].mode_count, shared);
    assert_eq!(ranked[0].offset, i64::from(start));
}

#[test]
fn uncorrelated_noise_has_no_dominant_offset() {
    let mut rng = seeded(0xDEAD_BEEF_CAFE_F00D);
    let index = FingerprintIndex::build((0..3).map(|id| {
        let landmarks = random_landmarks(&mut rng, 300, 512);
        hash_recording(&landmarks, TARGET_ZONE, RecordingId(id))
    }));

    let noise = random_landmarks(&mut rng, 200, 512);
    let ranked = match_query(&hash_query(&noise, TARGET_ZONE), &index, 3);
    if let Some(top) = ranked.first() {
        assert!(top.mode_count <= 2, "noise scored {}", top.mode_count);
    }
}

#[test]
fn empty_query_returns_nothing() {
    let mut rng = seeded(7);
    let landmarks = random_landmarks(&mut rng, 50, 128);
    let index = FingerprintIndex::build([hash_recording(&landmarks, TARGET_ZONE, RecordingId(0))]);

    let silent = Array2::<f32>::zeros((64, 100));
    let query_landmarks = extract_peaks(&silent, &PeakConfig::default()).unwrap();
    assert!(query_landmarks.is_empty());
    assert!(match_query(&hash_query(&query_landmarks, TARGET_ZONE), &index, 3).is_empty());
}

#[test]
fn hashes_only_pair_landmarks_within_the_target_zone() {
    let mut rng = seeded(99);
    let landmarks = random_landmarks(&mut rng, 120, 64);
    let zone = 6;

    let mut sorted = landmarks.clone();
    sorted.sort_by_key(|lm| (lm.time_frame, lm.freq_bin));
    let mut allowed = HashSet::new();
    for i in 0..sorted.len() {
        for j in i + 1..(i + zone).min(sorted.len()) {
            allowed.insert((sorted[i].freq_bin, sorted[j].freq_bin, sorted[j].time_frame - sorted[i].time_frame));
        }
    }

    for key in hash_query(&landmarks, zone).keys() {
        assert!(allowed.contains(&(key.anchor_freq(), key.target_freq(), key.time_delta())));
    }
}

#[test]
fn persisted_index_answers_the_same_lookups() {
    let mut rng = seeded(1234);
    let index = FingerprintIndex::build((0..4).map(|id| {
        hash_recording(&random_landmarks(&mut rng, 150, 256), TARGET_ZONE, RecordingId(id))
    }));

    let blob = index.persist().unwrap();
    let restored = FingerprintIndex::restore(&blob).unwrap();
    for (key, occurrence) in index.iter() {
        assert_eq!(restored.lookup(key), Some(occurrence));
    }
    assert_eq!(restored.persist().unwrap(), blob);
}
