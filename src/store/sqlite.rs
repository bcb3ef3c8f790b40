//! Embedded relational store backed by SQLite.
//!
//! Holds one row per table key:
//! `dataset(id, table_key, header, table_data, last_updated)` where
//! `table_data` is the serialized wire row array. `replace_all` runs as a
//! single transaction (delete all, bulk insert) so a crash mid-refresh can
//! never expose a mixed old/new state to `load`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::warn;

use crate::models::{Dataset, RowSet, TableRecord, NEVER_UPDATED};

use super::file::fallback_dataset;
use super::{Store, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// Read-only JSON snapshot used when the database cannot be read.
    bundled: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            bundled: None,
        })
    }

    pub fn with_bundled(
        path: impl AsRef<Path>,
        bundled: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::open(path)?;
        store.bundled = Some(bundled.into());
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            bundled: None,
        })
    }

    fn read_all(&self) -> Result<Dataset, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT table_key, header, table_data, last_updated FROM dataset ORDER BY table_key",
        )?;

        let mut tables = BTreeMap::new();
        let mut last_updated = None;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        for row in rows {
            let (key, header, table_data, stamp) = row?;
            let wire: Value = serde_json::from_str(&table_data)?;
            let rows = RowSet::from_wire(wire).map_err(|e| {
                StoreError::Corrupt(format!("table {}: {}", key, e))
            })?;
            tables.insert(key, TableRecord { header, rows });
            last_updated.get_or_insert(stamp);
        }

        Ok(Dataset::new(
            tables,
            last_updated.unwrap_or_else(|| NEVER_UPDATED.to_string()),
        ))
    }

    fn write_all(
        &self,
        tables: &BTreeMap<String, TableRecord>,
        last_updated: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM dataset", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dataset (table_key, header, table_data, last_updated) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (key, record) in tables {
                stmt.execute(params![
                    key,
                    record.header,
                    record.rows.to_wire().to_string(),
                    last_updated,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS dataset (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_key TEXT NOT NULL UNIQUE,
            header TEXT NOT NULL,
            table_data TEXT NOT NULL,
            last_updated TEXT NOT NULL
        );
        "#,
    )
}

impl Store for SqliteStore {
    fn load(&self) -> Dataset {
        match self.read_all() {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(error = %e, "Failed to read database, falling back");
                fallback_dataset(self.bundled.as_deref())
            }
        }
    }

    fn save(&self, dataset: &Dataset) -> Result<(), StoreError> {
        self.write_all(&dataset.tables, &dataset.last_updated)
    }

    fn replace_all(
        &self,
        tables: &BTreeMap<String, TableRecord>,
        last_updated: &str,
    ) -> Result<(), StoreError> {
        self.write_all(tables, last_updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_dataset() -> Dataset {
        serde_json::from_value(json!({
            "tables": {
                "T1": {"header": "Relays", "table": [{"name": "x", "qty": 1}]},
                "T2": {"header": "Breakers", "table": [["id", "state"], [7, "open"]]}
            },
            "last_updated": "2024-01-01 00:00:00"
        }))
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dataset = sample_dataset();
        store.save(&dataset).unwrap();
        assert_eq!(store.load(), dataset);
    }

    #[test]
    fn test_empty_database_loads_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let loaded = store.load();
        assert!(loaded.is_empty());
        assert_eq!(loaded.last_updated, NEVER_UPDATED);
    }

    #[test]
    fn test_replace_all_drops_old_keys() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(&sample_dataset()).unwrap();

        let mut tables = BTreeMap::new();
        tables.insert("T9".to_string(), sample_dataset().tables["T1"].clone());
        store.replace_all(&tables, "2024-06-01 00:00:00").unwrap();

        let loaded = store.load();
        let keys: Vec<_> = loaded.tables.keys().cloned().collect();
        assert_eq!(keys, vec!["T9"]);
        assert_eq!(loaded.last_updated, "2024-06-01 00:00:00");
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");

        let dataset = sample_dataset();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&dataset).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load(), dataset);
    }
}
