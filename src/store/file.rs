//! Flat-file JSON store.
//!
//! Persists the whole dataset as `{"tables": {...}, "last_updated": "..."}`.
//! Writes go through a temp-file-then-rename so a crash mid-write cannot
//! leave a half-written file behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::{Dataset, TableRecord};

use super::{Store, StoreError};

pub struct FileStore {
    path: PathBuf,
    /// Read-only fallback shipped with the application, used when the main
    /// file is present but unreadable.
    bundled: Option<PathBuf>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bundled: None,
        }
    }

    pub fn with_bundled(path: impl Into<PathBuf>, bundled: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bundled: Some(bundled.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a flat-file dataset from disk.
///
/// Shared with the SQLite backend, which reuses the same JSON shape for its
/// bundled fallback snapshot.
pub fn read_json_dataset(path: &Path) -> Result<Dataset, StoreError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write `bytes` to `path` via a temp file in the same directory, then
/// rename over the target.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolve a corrupt or unreadable main file: bundled snapshot if one is
/// configured and parses, else an empty dataset.
pub(super) fn fallback_dataset(bundled: Option<&Path>) -> Dataset {
    if let Some(bundled) = bundled {
        match read_json_dataset(bundled) {
            Ok(dataset) => {
                debug!(path = ?bundled, tables = dataset.tables.len(), "Loaded bundled snapshot");
                return dataset;
            }
            Err(e) => {
                warn!(path = ?bundled, error = %e, "Failed to read bundled snapshot");
            }
        }
    }
    Dataset::empty()
}

impl Store for FileStore {
    fn load(&self) -> Dataset {
        if !self.path.exists() {
            debug!(path = ?self.path, "No local store yet, starting empty");
            return Dataset::empty();
        }
        match read_json_dataset(&self.path) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read local store, falling back");
                fallback_dataset(self.bundled.as_deref())
            }
        }
    }

    fn save(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let contents = serde_json::to_vec(dataset)?;
        atomic_write(&self.path, &contents)
    }

    fn replace_all(
        &self,
        tables: &BTreeMap<String, TableRecord>,
        last_updated: &str,
    ) -> Result<(), StoreError> {
        // The file is rewritten wholesale, so replace-all and save coincide.
        self.save(&Dataset::new(tables.clone(), last_updated))
    }
}
