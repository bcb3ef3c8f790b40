//! Durable local storage for the dataset.
//!
//! Two functionally equivalent backends are provided:
//! - `FileStore`: a single flat JSON file
//! - `SqliteStore`: an embedded relational table, one row per table key
//!
//! Both honor the same contract: `load` never fails (it degrades to a
//! bundled snapshot or an empty dataset), and `replace_all` leaves no trace
//! of the previous contents.

pub mod file;
pub mod sqlite;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{Dataset, TableRecord};

pub use file::FileStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

/// Durable representation of the dataset.
pub trait Store: Send + Sync {
    /// Read the stored dataset. Never raises: an absent store yields an
    /// empty dataset; a corrupt one is logged and degrades to the bundled
    /// snapshot if configured, else to an empty dataset.
    fn load(&self) -> Dataset;

    /// Write the full dataset, overwriting any previous contents.
    fn save(&self, dataset: &Dataset) -> Result<(), StoreError>;

    /// Atomic delete-everything-insert-everything, used by refresh. A crash
    /// mid-operation must not leave a mixed old/new state visible to a
    /// subsequent `load`.
    fn replace_all(
        &self,
        tables: &BTreeMap<String, TableRecord>,
        last_updated: &str,
    ) -> Result<(), StoreError>;
}
