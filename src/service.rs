//! The surface the presentation layer talks to.
//!
//! Wires a store, the HTTP client, the sync controller, and a search engine
//! together from one `Config`, and exposes the handful of operations a UI
//! needs: read the snapshot, refresh, search, schedule freshness checks,
//! persist on the way out.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{SyncClient, SyncError};
use crate::config::{Config, StoreKind};
use crate::models::Dataset;
use crate::search::{SearchEngine, SearchStream};
use crate::store::{FileStore, SqliteStore, Store, StoreError};
use crate::sync::{RefreshOutcome, SyncController, SyncOptions};

pub struct SearchService {
    controller: Arc<SyncController>,
    engine: SearchEngine,
}

impl SearchService {
    /// Build the full stack from a config. Does no I/O; call `start` to
    /// load and publish the stored dataset.
    pub fn new(config: &Config) -> Result<Self> {
        let store_path = config.store_path()?;

        let store: Arc<dyn Store> = match (config.store_kind, &config.bundled_snapshot) {
            (StoreKind::Json, None) => Arc::new(FileStore::new(&store_path)),
            (StoreKind::Json, Some(bundled)) => {
                Arc::new(FileStore::with_bundled(&store_path, bundled))
            }
            (StoreKind::Sqlite, None) => Arc::new(
                SqliteStore::open(&store_path)
                    .with_context(|| format!("Failed to open database at {:?}", store_path))?,
            ),
            (StoreKind::Sqlite, Some(bundled)) => Arc::new(
                SqliteStore::with_bundled(&store_path, bundled)
                    .with_context(|| format!("Failed to open database at {:?}", store_path))?,
            ),
        };

        let client = SyncClient::new(config.accept_invalid_certs)
            .context("Failed to build HTTP client")?;

        let controller = Arc::new(SyncController::new(
            store,
            client,
            SyncOptions {
                data_url: config.data_url.clone(),
                refresh_interval: config.refresh_interval(),
            },
        ));

        Ok(Self {
            controller,
            engine: SearchEngine::new(),
        })
    }

    /// Load the stored dataset and publish it, refreshing first if nothing
    /// is stored locally.
    pub async fn start(&self) {
        self.controller.start().await;
    }

    /// Read-only snapshot of the current dataset.
    pub fn tables(&self) -> Arc<Dataset> {
        self.controller.tables()
    }

    /// Manual refresh. Errors surface to the caller; a refresh already in
    /// flight absorbs the request.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SyncError> {
        self.controller.refresh().await
    }

    /// Search the current snapshot. Supersedes this service's previous
    /// search, delivering results one table at a time.
    pub fn search(&self, query: &str) -> SearchStream {
        self.engine.search(self.controller.tables(), query)
    }

    /// Start the hourly (by config) background freshness checker.
    pub fn spawn_freshness_task(&self) -> tokio::task::JoinHandle<()> {
        self.controller.spawn_freshness_task()
    }

    /// Final persist, for process shutdown.
    pub async fn persist(&self) -> Result<(), StoreError> {
        self.controller.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchEvent;
    use tempfile::tempdir;

    fn service_with_store(dir: &std::path::Path, kind: StoreKind) -> SearchService {
        let mut config = Config::new("http://127.0.0.1:9/unused");
        config.store_kind = kind;
        config.store_path = Some(dir.join(match kind {
            StoreKind::Json => "data.json",
            StoreKind::Sqlite => "data.db",
        }));
        SearchService::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_search_yields_no_results() {
        let dir = tempdir().unwrap();
        let service = service_with_store(dir.path(), StoreKind::Json);

        // No local data, refresh fails (closed port), service still runs.
        service.start().await;
        assert!(service.tables().is_empty());

        let events = service.search("anything").collect().await;
        assert_eq!(events, vec![SearchEvent::NoResults]);
    }

    #[tokio::test]
    async fn test_sqlite_backend_wires_up() {
        let dir = tempdir().unwrap();
        let service = service_with_store(dir.path(), StoreKind::Sqlite);
        service.start().await;
        assert!(service.tables().is_empty());
        service.persist().await.unwrap();
    }
}
