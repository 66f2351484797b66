use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::audio::DecodedAudio;
use crate::catalog::{scan_directory, AudioFile, Catalog, RecordingId};
use crate::config::Config;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprinter;
use crate::hashing::RecordingHashes;
use crate::index::{FingerprintIndex, IndexBuilder};
use crate::matching::{match_query, Candidate};
use crate::peaks::Landmark;

/// A ranked identification result with its catalog name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub recording_id: RecordingId,
    pub name: String,
    /// Mode count of the offset histogram.
    pub score: usize,
    /// Position of the query inside the reference, in frames.
    pub offset_frames: i64,
}

/// A loaded library ready to answer queries.
///
/// Catalog and index are shared behind `Arc` and never mutated, so clones
/// can be handed to any number of concurrent readers.
#[derive(Debug, Clone)]
pub struct AudioMatcher {
    fingerprinter: Fingerprinter,
    catalog: Arc<Catalog>,
    index: Arc<FingerprintIndex>,
}

impl AudioMatcher {
    /// Wraps an existing catalog and index after checking they agree.
    pub fn from_parts(config: Config, catalog: Catalog, index: FingerprintIndex) -> Result<Self> {
        config.validate()?;
        index.check_catalog(&catalog)?;
        Ok(Self {
            fingerprinter: Fingerprinter::new(config),
            catalog: Arc::new(catalog),
            index: Arc::new(index),
        })
    }

    /// Fingerprints every `.wav` in `dir` and builds a fresh library.
    ///
    /// Recordings are hashed on blocking worker threads, at most one per
    /// available core. Their hashes are merged strictly in catalog order so
    /// collisions resolve the same way on every build.
    pub async fn build_from_folder(dir: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        let files = scan_directory(dir)?;
        let catalog = Catalog::from_names(files.iter().map(|file| file.name.clone()))?;
        let fingerprinter = Fingerprinter::new(config.clone());

        info!(recordings = files.len(), dir = %dir.display(), "fingerprinting reference recordings");

        let jobs: Vec<(RecordingId, AudioFile)> = files
            .into_iter()
            .enumerate()
            .map(|(position, file)| (RecordingId(position as u32), file))
            .collect();

        let mut builder = IndexBuilder::new();
        for_each_ordered(
            jobs,
            worker_limit(),
            move |(id, file): (RecordingId, AudioFile)| fingerprint_recording(&fingerprinter, &file, id),
            |_, hashes: RecordingHashes| {
                builder.merge(hashes);
                Ok(())
            },
        )
        .await?;
        let index = builder.finish();

        info!(recordings = catalog.len(), keys = index.len(), "library built");
        Self::from_parts(config, catalog, index)
    }

    /// Loads the library stored at `index_path`, or builds it from `dir`
    /// and stores it there when the file does not exist yet.
    ///
    /// A loaded library must have been built from the same file listing as
    /// `dir` currently shows.
    pub async fn open_or_build(dir: &Path, index_path: &Path, config: Config) -> Result<Self> {
        if index_path.exists() {
            let db = Database::open(index_path).await?;
            let stored = db.load_for(&config).await?;
            db.close().await;

            if let Some(stored) = stored {
                let listed = Catalog::from_names(scan_directory(dir)?.into_iter().map(|f| f.name))?;
                if listed != stored.catalog {
                    return Err(Error::CatalogMismatch(format!(
                        "{}: {}",
                        dir.display(),
                        first_difference(&listed, &stored.catalog)
                    )));
                }
                info!(
                    recordings = stored.catalog.len(),
                    keys = stored.index.len(),
                    path = %index_path.display(),
                    "library loaded"
                );
                return Self::from_parts(config, stored.catalog, stored.index);
            }
        }

        let matcher = Self::build_from_folder(dir, config).await?;
        let db = Database::open(index_path).await?;
        db.save(&matcher.catalog, &matcher.index, matcher.config()).await?;
        db.close().await;
        Ok(matcher)
    }

    /// Loads a stored library; fails if nothing has been stored.
    pub async fn load(index_path: &Path, config: Config) -> Result<Self> {
        if !index_path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no index at {}", index_path.display()),
            )));
        }
        let db = Database::open(index_path).await?;
        let stored = db.load_for(&config).await?;
        db.close().await;

        let stored = stored.ok_or_else(|| Error::Corrupt(format!("{} holds no library", index_path.display())))?;
        Self::from_parts(config, stored.catalog, stored.index)
    }

    pub fn config(&self) -> &Config {
        self.fingerprinter.config()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &FingerprintIndex {
        &self.index
    }

    pub fn top_n(&self) -> usize {
        self.config().matching.top_n
    }

    pub fn identify_landmarks(&self, landmarks: &[Landmark]) -> Result<Vec<Match>> {
        let query = self.fingerprinter.query_hashes(landmarks);
        let candidates = match_query(&query, &self.index, self.top_n());
        self.resolve(candidates)
    }

    pub fn identify_audio(&self, audio: &DecodedAudio) -> Result<Vec<Match>> {
        let landmarks = self.fingerprinter.landmarks_from_audio(audio)?;
        self.identify_landmarks(&landmarks)
    }

    pub fn identify_bytes(&self, audio_data: &[u8]) -> Result<Vec<Match>> {
        let landmarks = self.fingerprinter.landmarks_from_bytes(audio_data)?;
        self.identify_landmarks(&landmarks)
    }

    pub fn identify_file(&self, path: &Path) -> Result<Vec<Match>> {
        let landmarks = self.fingerprinter.landmarks_from_file(path)?;
        self.identify_landmarks(&landmarks)
    }

    fn resolve(&self, candidates: Vec<Candidate>) -> Result<Vec<Match>> {
        candidates
            .into_iter()
            .map(|candidate| {
                Ok(Match {
                    recording_id: candidate.recording_id,
                    name: self.catalog.name(candidate.recording_id)?.to_owned(),
                    score: candidate.mode_count,
                    offset_frames: candidate.offset,
                })
            })
            .collect()
    }

    /// Identifies every `.wav` in `queries_dir` and writes one line per
    /// query: the query name followed by its matches, tab separated.
    /// Returns the number of queries processed.
    pub async fn identify_folder(&self, queries_dir: &Path, output: &Path) -> Result<usize> {
        let files = scan_directory(queries_dir)?;
        info!(queries = files.len(), dir = %queries_dir.display(), "identifying queries");

        let matcher = self.clone();
        let mut report = String::new();
        for_each_ordered(
            files.clone(),
            worker_limit(),
            move |file: AudioFile| matcher.identify_file(&file.path),
            |position, matches: Vec<Match>| {
                let name = &files[position].name;
                debug!(
                    query = %name,
                    top = matches.first().map(|m| m.name.as_str()).unwrap_or("-"),
                    "query identified"
                );
                report.push_str(&result_line(name, &matches));
                report.push('\n');
                Ok(())
            },
        )
        .await?;
        tokio::fs::write(output, report).await?;

        info!(queries = files.len(), output = %output.display(), "results written");
        Ok(files.len())
    }
}

fn fingerprint_recording(
    fingerprinter: &Fingerprinter,
    file: &AudioFile,
    id: RecordingId,
) -> Result<RecordingHashes> {
    let landmarks = fingerprinter.landmarks_from_file(&file.path)?;
    let hashes = fingerprinter.recording_hashes(&landmarks, id);
    debug!(
        recording = %file.name,
        landmarks = landmarks.len(),
        keys = hashes.len(),
        "recording fingerprinted"
    );
    Ok(hashes)
}

fn worker_limit() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

/// Runs `work` on blocking threads with at most `limit` items in flight and
/// hands each result to `sink` in input order.
///
/// Results that finish early wait for their predecessors; new items are only
/// started while fewer than `limit` items are running or waiting.
async fn for_each_ordered<T, R, W, S>(items: Vec<T>, limit: usize, work: W, mut sink: S) -> Result<()>
where
    T: Send + 'static,
    R: Send + 'static,
    W: Fn(T) -> Result<R> + Send + Sync + 'static,
    S: FnMut(usize, R) -> Result<()>,
{
    let work = Arc::new(work);
    let limit = limit.max(1);
    let mut items = items.into_iter().enumerate();
    let mut tasks = JoinSet::new();
    let mut waiting = BTreeMap::new();
    let mut started = 0;
    let mut next = 0;

    loop {
        while started < next + limit {
            let Some((position, item)) = items.next() else {
                break;
            };
            let work = Arc::clone(&work);
            tasks.spawn_blocking(move || work(item).map(|result| (position, result)));
            started += 1;
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        let (position, result) = joined??;
        waiting.insert(position, result);
        while let Some(result) = waiting.remove(&next) {
            sink(next, result)?;
            next += 1;
        }
    }
    Ok(())
}

/// Names the first entry where two catalogs disagree.
fn first_difference(listed: &Catalog, stored: &Catalog) -> String {
    let mut listed_names = listed.iter().map(|(_, name)| name);
    let mut stored_names = stored.iter().map(|(_, name)| name);
    loop {
        match (listed_names.next(), stored_names.next()) {
            (Some(found), Some(expected)) if found == expected => continue,
            (Some(found), Some(expected)) => {
                return format!("found {found} where the stored index has {expected}")
            }
            (Some(found), None) => return format!("{found} is not in the stored index"),
            (None, Some(expected)) => return format!("{expected} is missing from the folder"),
            (None, None) => return "catalogs are identical".to_owned(),
        }
    }
}

/// `query<TAB>match1<TAB>match2...`
pub fn result_line(query_name: &str, matches: &[Match]) -> String {
    let mut line = String::from(query_name);
    for m in matches {
        let _ = write!(line, "\t{}", m.name);
    }
    line
}
