//! Landmark-based audio identification.
//!
//! Reference recordings are reduced to spectrogram landmarks, landmark pairs
//! are hashed into [`FingerprintKey`]s and merged into a [`FingerprintIndex`].
//! A query clip is hashed the same way and every reference it shares keys
//! with is scored by how many of those keys agree on a single time offset.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod fingerprint;
pub mod hashing;
pub mod index;
pub mod matcher;
pub mod matching;
pub mod peaks;
pub mod server;

pub use catalog::{Catalog, RecordingId};
pub use config::Config;
pub use error::{Error, Result};
pub use fingerprint::Fingerprinter;
pub use hashing::{hash_query, hash_recording, FingerprintKey, IndexedOccurrence, QueryOccurrence};
pub use index::{FingerprintIndex, IndexBuilder};
pub use matcher::{AudioMatcher, Match};
pub use matching::{match_query, Candidate};
pub use peaks::{extract_peaks, Landmark};
