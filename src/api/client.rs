//! HTTP client for the remote dataset source.
//!
//! Two operations only: a timed GET that pulls the whole dataset, and a
//! timed HEAD that reads the `Last-Modified` header without transferring
//! the payload.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{header, Client};
use tracing::{debug, warn};

use crate::models::{TableRecord, WireTable};

use super::SyncError;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for the full dataset GET.
/// The payload is a single JSON document, typically well under a megabyte.
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Timeout for the freshness HEAD probe.
/// Probes are best-effort background maintenance, so fail fast.
const FRESHNESS_TIMEOUT_SECS: u64 = 5;

/// HTTP client for the dataset source.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct SyncClient {
    client: Client,
}

impl SyncClient {
    /// Create a new client. TLS verification stays on unless the caller
    /// explicitly opts out.
    pub fn new(accept_invalid_certs: bool) -> Result<Self, SyncError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if accept_invalid_certs {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    fn request_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-cache"),
        );
        headers
    }

    /// Fetch the remote dataset and classify each table's rows.
    pub async fn fetch_tables(
        &self,
        url: &str,
    ) -> Result<BTreeMap<String, TableRecord>, SyncError> {
        debug!(url, "Fetching dataset");

        let response = self
            .client
            .get(url)
            .headers(Self::request_headers())
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::from_status(response.status()));
        }

        let text = response.text().await?;
        let tables = parse_wire_document(&text)?;

        debug!(tables = tables.len(), "Dataset fetched");
        Ok(tables)
    }

    /// Probe the remote for freshness via HEAD.
    ///
    /// Returns the `Last-Modified` header value if the server sent one.
    /// Callers treat errors as "unknown, skip this check".
    pub async fn check_freshness(&self, url: &str) -> Result<Option<String>, SyncError> {
        let response = self
            .client
            .head(url)
            .headers(Self::request_headers())
            .timeout(Duration::from_secs(FRESHNESS_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::from_status(response.status()));
        }

        Ok(response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string))
    }
}

/// Parse a dataset document body into classified tables.
///
/// A table whose body violates the row-encoding rules is skipped with a
/// warning; the rest of the payload survives.
pub fn parse_wire_document(text: &str) -> Result<BTreeMap<String, TableRecord>, SyncError> {
    let wire: BTreeMap<String, WireTable> = serde_json::from_str(text)?;

    let mut tables = BTreeMap::new();
    for (key, wire_table) in wire {
        match TableRecord::from_wire(wire_table) {
            Ok(record) => {
                tables.insert(key, record);
            }
            Err(e) => {
                warn!(table = %key, error = %e, "Skipping table with malformed rows");
            }
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowSet;

    #[test]
    fn test_parse_wire_document() {
        let body = r#"{
            "A": {"header": "Apples", "table": [{"name": "x", "qty": 1}, {"name": "y", "qty": 2}]},
            "B": {"header": "Bolts", "table": [["size", "count"], ["M4", 12]]}
        }"#;

        let tables = parse_wire_document(body).unwrap();
        assert_eq!(tables.len(), 2);
        assert!(matches!(tables["A"].rows, RowSet::Columnar(_)));
        assert!(matches!(tables["B"].rows, RowSet::Tabular { .. }));
        assert_eq!(tables["A"].header, "Apples");
    }

    #[test]
    fn test_parse_skips_malformed_table() {
        let body = r#"{
            "good": {"header": "Fine", "table": [{"a": 1}]},
            "bad": {"header": "Broken", "table": "not rows"}
        }"#;

        let tables = parse_wire_document(body).unwrap();
        assert_eq!(tables.len(), 1);
        assert!(tables.contains_key("good"));
    }

    #[test]
    fn test_parse_rejects_non_object_document() {
        assert!(matches!(
            parse_wire_document("[1, 2, 3]"),
            Err(SyncError::Parse(_))
        ));
    }

    #[test]
    fn test_from_status() {
        let err = SyncError::from_status(reqwest::StatusCode::NOT_FOUND);
        assert!(matches!(err, SyncError::HttpStatus { code: 404 }));
        assert_eq!(err.to_string(), "server returned HTTP 404");
    }
}
