use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense identifier of a reference recording, assigned in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(pub u32);

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional recording id <-> name registry. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    names: Vec<String>,
    ids: HashMap<String, RecordingId>,
}

impl Catalog {
    /// Assigns ids 0, 1, 2, ... to the names in the order given.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Catalog::default();
        for name in names {
            let name = name.into();
            let id = RecordingId(catalog.names.len() as u32);
            if catalog.ids.insert(name.clone(), id).is_some() {
                return Err(Error::DuplicateRecording(name));
            }
            catalog.names.push(name);
        }
        Ok(catalog)
    }

    pub fn name(&self, id: RecordingId) -> Result<&str> {
        self.names
            .get(id.0 as usize)
            .map(String::as_str)
            .ok_or(Error::UnknownRecording(id))
    }

    pub fn id(&self, name: &str) -> Option<RecordingId> {
        self.ids.get(name).copied()
    }

    pub fn contains(&self, id: RecordingId) -> bool {
        (id.0 as usize) < self.names.len()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordingId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (RecordingId(i as u32), name.as_str()))
    }
}

/// A recording file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub name: String,
    pub path: PathBuf,
}

/// Lists the `.wav` files of a directory sorted by file name, which fixes the
/// catalog order (and with it the index overwrite order) for a given folder.
pub fn scan_directory(dir: &Path) -> Result<Vec<AudioFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if !is_wav {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push(AudioFile { name, path });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
