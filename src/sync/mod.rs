//! Dataset synchronization: load on start, manual refresh, periodic
//! freshness checks, and snapshot publication.

pub mod controller;
pub mod freshness;

pub use controller::{ControllerState, RefreshOutcome, SyncController, SyncOptions};
pub use freshness::is_newer;
