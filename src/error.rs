use crate::catalog::RecordingId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An occurrence references a recording the catalog does not know about.
    /// The index and catalog were built from different inputs.
    #[error("unknown recording id {0}")]
    UnknownRecording(RecordingId),

    #[error("recording {0:?} appears more than once in the catalog")]
    DuplicateRecording(String),

    #[error("catalog mismatch: {0}")]
    CatalogMismatch(String),

    #[error("corrupt index snapshot: {0}")]
    Snapshot(String),

    #[error("unsupported index snapshot version {found} (expected {expected})")]
    UnsupportedSnapshotVersion { found: u32, expected: u32 },

    #[error("corrupt stored library: {0}")]
    Corrupt(String),

    #[error("spectrogram has {0} frequency bins, at most 65536 are supported")]
    SpectrogramTooTall(usize),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Audio(err.to_string())
    }
}
