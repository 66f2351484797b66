//! Tunable constants for fingerprinting and matching.
//!
//! Every field has a default, so a config file only needs to name the values
//! it changes:
//!
//! ```json
//! { "hashing": { "target_zone": 30 }, "matching": { "top_n": 5 } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest accepted `hashing.target_zone`.
pub const MAX_TARGET_ZONE: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub peaks: PeakConfig,
    pub hashing: HashConfig,
    pub matching: MatchConfig,
}

/// Parameters of the spectral transform. Their scale defines what one
/// "time frame" means for every offset reported by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Convert magnitudes to decibels before peak picking.
    pub decibels: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_fft: 4096,
            hop_length: 2048,
            decibels: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// L1 radius of the local-maximum neighborhood.
    pub neighborhood_radius: usize,
    /// Percentile (0..=100) of all magnitudes a landmark must exceed.
    pub magnitude_percentile: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            neighborhood_radius: 15,
            magnitude_percentile: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Each anchor is paired with the next `target_zone - 1` landmarks.
    pub target_zone: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self { target_zone: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub top_n: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { top_n: 3 }
    }
}

impl Config {
    /// Loads a JSON config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                serde_json::from_str::<Config>(&raw)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.analysis.sample_rate == 0 {
            return Err(Error::InvalidConfig("analysis.sample_rate must be positive".into()));
        }
        if self.analysis.n_fft < 2 {
            return Err(Error::InvalidConfig("analysis.n_fft must be at least 2".into()));
        }
        if self.analysis.hop_length == 0 {
            return Err(Error::InvalidConfig("analysis.hop_length must be positive".into()));
        }
        let percentile = self.peaks.magnitude_percentile;
        if !(0.0..=100.0).contains(&percentile) {
            return Err(Error::InvalidConfig(format!(
                "peaks.magnitude_percentile must be within 0..=100, got {percentile}"
            )));
        }
        let zone = self.hashing.target_zone;
        if !(2..=MAX_TARGET_ZONE).contains(&zone) {
            return Err(Error::InvalidConfig(format!(
                "hashing.target_zone must be within 2..={MAX_TARGET_ZONE}, got {zone}"
            )));
        }
        Ok(())
    }

    /// The part of the configuration that shapes the stored fingerprints.
    /// Two libraries are only comparable when these sections agree.
    pub fn fingerprint_settings(&self) -> serde_json::Value {
        serde_json::json!({
            "analysis": self.analysis,
            "peaks": self.peaks,
            "hashing": self.hashing,
        })
    }
}
