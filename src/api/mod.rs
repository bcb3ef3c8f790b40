//! HTTP client module for the remote dataset source.
//!
//! This module provides the `SyncClient` for fetching the published dataset
//! and probing its freshness. The remote is a plain JSON document; no
//! authentication is involved.

pub mod client;
pub mod error;

pub use client::SyncClient;
pub use error::SyncError;
