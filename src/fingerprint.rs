use std::path::Path;

use ndarray::Array2;

use crate::audio::{self, DecodedAudio};
use crate::catalog::RecordingId;
use crate::config::Config;
use crate::error::Result;
use crate::hashing::{hash_query, hash_recording, QueryHashes, RecordingHashes};
use crate::peaks::{extract_peaks, Landmark};

/// Runs one recording through spectrogram -> landmarks -> hashes.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    config: Config,
}

impl Fingerprinter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn landmarks_from_spectrogram(&self, spectrogram: &Array2<f32>) -> Result<Vec<Landmark>> {
        extract_peaks(spectrogram, &self.config.peaks)
    }

    pub fn landmarks_from_audio(&self, audio: &DecodedAudio) -> Result<Vec<Landmark>> {
        let spectrogram = audio::analyze(audio, &self.config.analysis)?;
        self.landmarks_from_spectrogram(&spectrogram)
    }

    pub fn landmarks_from_bytes(&self, audio_data: &[u8]) -> Result<Vec<Landmark>> {
        let decoded = audio::decode_audio(audio_data)?;
        self.landmarks_from_audio(&decoded)
    }

    pub fn landmarks_from_file(&self, path: &Path) -> Result<Vec<Landmark>> {
        let audio_data = std::fs::read(path)?;
        self.landmarks_from_bytes(&audio_data)
    }

    pub fn recording_hashes(&self, landmarks: &[Landmark], recording_id: RecordingId) -> RecordingHashes {
        hash_recording(landmarks, self.config.hashing.target_zone, recording_id)
    }

    pub fn query_hashes(&self, landmarks: &[Landmark]) -> QueryHashes {
        hash_query(landmarks, self.config.hashing.target_zone)
    }
}
