//! Orchestration of the local dataset against the remote source.
//!
//! The controller owns the published snapshot. Exactly one writer (the
//! refresh path) replaces it wholesale via an atomic reference swap; any
//! number of readers hold `Arc<Dataset>` clones that stay valid while they
//! iterate, even across a concurrent refresh.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::api::{SyncClient, SyncError};
use crate::models::{Dataset, TableRecord};
use crate::store::{Store, StoreError};

use super::freshness::{is_newer, TIMESTAMP_FORMAT};

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Refreshing,
    CheckingFreshness,
}

/// What a `refresh` call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fetch ran to completion and the snapshot was replaced.
    Completed,
    /// Another refresh was already in flight; this request folded into it.
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// URL of the remote dataset document.
    pub data_url: String,
    /// Period between background freshness checks.
    pub refresh_interval: Duration,
}

pub struct SyncController {
    store: Arc<dyn Store>,
    client: SyncClient,
    options: SyncOptions,
    current: RwLock<Arc<Dataset>>,
    state: Mutex<ControllerState>,
    refreshing: AtomicBool,
}

impl SyncController {
    pub fn new(store: Arc<dyn Store>, client: SyncClient, options: SyncOptions) -> Self {
        Self {
            store,
            client,
            options,
            current: RwLock::new(Arc::new(Dataset::empty())),
            state: Mutex::new(ControllerState::Idle),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Load the stored dataset and publish it. If nothing local exists at
    /// all, go straight into a refresh; its failure is logged, not fatal,
    /// so startup succeeds offline.
    pub async fn start(&self) {
        let store = Arc::clone(&self.store);
        let loaded = match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(dataset) => dataset,
            Err(e) => {
                error!(error = %e, "Store load task failed");
                Dataset::empty()
            }
        };

        let empty = loaded.is_empty();
        info!(tables = loaded.tables.len(), last_updated = %loaded.last_updated, "Loaded local dataset");
        self.publish(loaded);

        if empty {
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "Initial refresh failed, continuing with empty dataset");
            }
        }
    }

    /// Current published snapshot. Cheap: clones an `Arc`, never row data.
    pub fn tables(&self) -> Arc<Dataset> {
        Arc::clone(&self.current.read())
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.lock() = state;
    }

    fn publish(&self, dataset: Dataset) {
        *self.current.write() = Arc::new(dataset);
    }

    /// Fetch the remote dataset, replace the published snapshot wholesale,
    /// and write it through to the store.
    ///
    /// Concurrent calls collapse into one fetch: whichever call loses the
    /// in-flight race returns `Coalesced` immediately. On fetch failure the
    /// previous snapshot stays published and the error is returned.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SyncError> {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!("Refresh already in flight, coalescing");
            return Ok(RefreshOutcome::Coalesced);
        }

        self.set_state(ControllerState::Refreshing);
        let result = self.do_refresh().await;
        self.set_state(ControllerState::Idle);
        self.refreshing.store(false, Ordering::SeqCst);

        result.map(|_| RefreshOutcome::Completed)
    }

    async fn do_refresh(&self) -> Result<(), SyncError> {
        let tables = self.client.fetch_tables(&self.options.data_url).await?;
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        info!(tables = tables.len(), last_updated = %stamp, "Refresh succeeded");
        self.install(tables, stamp).await;
        Ok(())
    }

    /// Publish a new snapshot and persist it. Persistence failures are
    /// reported but do not undo the swap: the in-memory dataset is already
    /// authoritative.
    async fn install(&self, tables: BTreeMap<String, TableRecord>, last_updated: String) {
        self.publish(Dataset::new(tables, last_updated));

        let snapshot = self.tables();
        let store = Arc::clone(&self.store);
        let persisted = tokio::task::spawn_blocking(move || {
            store.replace_all(&snapshot.tables, &snapshot.last_updated)
        })
        .await;

        match persisted {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to persist refreshed dataset"),
            Err(e) => error!(error = %e, "Persist task failed"),
        }
    }

    /// One freshness probe: HEAD the source, compare stamps, refresh when
    /// the remote is newer. All failures are swallowed; this is best-effort
    /// background maintenance.
    pub async fn run_freshness_check(&self) {
        if self.refreshing.load(Ordering::SeqCst) {
            return;
        }

        self.set_state(ControllerState::CheckingFreshness);
        let result = self.client.check_freshness(&self.options.data_url).await;
        self.set_state(ControllerState::Idle);

        match result {
            Ok(Some(remote_stamp)) => {
                let local_stamp = self.tables().last_updated.clone();
                if is_newer(&remote_stamp, &local_stamp) {
                    info!(remote = %remote_stamp, local = %local_stamp, "Remote is newer, refreshing");
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "Scheduled refresh failed");
                    }
                } else {
                    debug!(remote = %remote_stamp, "Local dataset is current");
                }
            }
            Ok(None) => debug!("No Last-Modified header, skipping check"),
            Err(e) => debug!(error = %e, "Freshness check failed, skipping"),
        }
    }

    /// Spawn the periodic freshness checker. The first check runs one full
    /// interval after the call, not immediately.
    pub fn spawn_freshness_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.options.refresh_interval);
            ticker.tick().await; // completes immediately
            loop {
                ticker.tick().await;
                controller.run_freshness_check().await;
            }
        })
    }

    /// Write the current snapshot to the store. Intended as the final
    /// persist before shutdown.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let snapshot = self.tables();
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}
