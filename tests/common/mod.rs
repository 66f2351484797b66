#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use landmark_matcher::config::AnalysisConfig;
use landmark_matcher::{Config, Landmark};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_RATE: u32 = 8000;
pub const NOTE_SAMPLES: usize = 800;

/// Small, fast analysis settings for synthetic clips: 31.25 Hz bins and
/// ten frames per note.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.analysis = AnalysisConfig {
        sample_rate: SAMPLE_RATE,
        n_fft: 256,
        hop_length: 80,
        decibels: false,
    };
    config.peaks.neighborhood_radius = 5;
    // only the main lobes of the notes clear this
    config.peaks.magnitude_percentile = 97.0;
    config
}

/// One Hann-enveloped tone per entry, each centred on an FFT bin.
pub fn melody(bins: &[u32]) -> Vec<f32> {
    let bin_hz = SAMPLE_RATE as f32 / 256.0;
    let mut samples = Vec::with_capacity(bins.len() * NOTE_SAMPLES);
    for &bin in bins {
        let freq = bin as f32 * bin_hz;
        for i in 0..NOTE_SAMPLES {
            let envelope =
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / NOTE_SAMPLES as f32).cos());
            let t = samples.len() as f32 / SAMPLE_RATE as f32;
            samples.push(0.8 * envelope * (2.0 * std::f32::consts::PI * freq * t).sin());
        }
    }
    samples
}

pub fn wav_bytes(samples: &[f32]) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn write_wav(path: &Path, samples: &[f32]) {
    std::fs::write(path, wav_bytes(samples)).unwrap();
}

/// Landmarks at strictly increasing times with random frequencies.
pub fn random_landmarks(rng: &mut impl Rng, count: usize, max_freq: u16) -> Vec<Landmark> {
    let mut time = 0u32;
    (0..count)
        .map(|_| {
            time += rng.random_range(1..=3);
            Landmark::new(rng.random_range(0..max_freq), time)
        })
        .collect()
}

pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
