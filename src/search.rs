//! Incremental, cancelable search over a dataset snapshot.
//!
//! Every scan runs on its own task against an `Arc<Dataset>` snapshot, so a
//! concurrent refresh can never mutate rows out from under it. A generation
//! counter supersedes in-flight scans: results from an older search are
//! discarded once a newer one has started, no matter how the tasks
//! interleave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::{Dataset, RowSet, TableRecord};
use crate::utils::{cell_text, contains_ignore_case};

/// Buffer size for the result channel. Results are delivered one table at a
/// time, so a small buffer keeps slow consumers from piling up memory.
const SEARCH_CHANNEL_CAPACITY: usize = 32;

/// One table's search result.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMatch {
    pub table_key: String,
    pub header: String,
    /// The matched rows, or the table's full row set when only the header
    /// matched (the whole table is shown in that case).
    pub rows: RowSet,
    pub is_header_match: bool,
    /// How much this table adds to the running result count: the number of
    /// matched rows, or 1 for a header-only match.
    pub hit_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Match(TableMatch),
    /// Emitted exactly once, after the whole dataset has been scanned and
    /// nothing matched. Never emitted for an empty query.
    NoResults,
}

/// Receiving side of one search. Dropping it ends the scan.
pub struct SearchStream {
    rx: mpsc::Receiver<SearchEvent>,
}

impl SearchStream {
    /// Next event, or `None` once the scan has finished or been superseded.
    pub async fn next(&mut self) -> Option<SearchEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event.
    pub async fn collect(mut self) -> Vec<SearchEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

/// Scans dataset snapshots for a query without blocking the caller.
///
/// One engine per caller context: starting a new search on an engine
/// invalidates that engine's previous search.
pub struct SearchEngine {
    generation: Arc<AtomicU64>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a search over `snapshot`, superseding any search still running
    /// on this engine.
    ///
    /// An empty or whitespace-only query is the "clear results" case: it
    /// still supersedes the previous search, but delivers no matches and no
    /// `NoResults` signal.
    pub fn search(&self, snapshot: Arc<Dataset>, query: &str) -> SearchStream {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(SEARCH_CHANNEL_CAPACITY);

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return SearchStream { rx };
        }

        let live = Arc::clone(&self.generation);
        tokio::spawn(async move {
            let mut total = 0usize;

            for (key, record) in snapshot.tables.iter() {
                if live.load(Ordering::SeqCst) != generation {
                    debug!(generation, "Search superseded, stopping scan");
                    return;
                }

                if let Some(table_match) = evaluate_table(key, record, &needle) {
                    total += table_match.hit_count;
                    if tx.send(SearchEvent::Match(table_match)).await.is_err() {
                        return; // receiver gone
                    }
                }

                // One table per scheduling step keeps long scans from
                // monopolizing the worker.
                tokio::task::yield_now().await;
            }

            if total == 0 && live.load(Ordering::SeqCst) == generation {
                let _ = tx.send(SearchEvent::NoResults).await;
            }
        });

        SearchStream { rx }
    }
}

/// Apply the matching rule to one table.
///
/// The table is emitted iff its header matches or any row does. Matched
/// rows are returned as-is; a header-only match carries the full row set.
fn evaluate_table(key: &str, record: &TableRecord, needle: &str) -> Option<TableMatch> {
    let is_header_match = contains_ignore_case(&record.header, needle);
    let (matched_rows, matched_count) = matching_rows(&record.rows, needle);

    if !is_header_match && matched_count == 0 {
        return None;
    }

    let (rows, hit_count) = if matched_count > 0 {
        (matched_rows, matched_count)
    } else {
        (record.rows.clone(), 1)
    };

    Some(TableMatch {
        table_key: key.to_string(),
        header: record.header.clone(),
        rows,
        is_header_match,
        hit_count,
    })
}

/// Filter a row set down to the rows containing `needle` in any cell,
/// preserving the encoding (and named columns) of the original.
fn matching_rows(rows: &RowSet, needle: &str) -> (RowSet, usize) {
    match rows {
        RowSet::Columnar(maps) => {
            let hits: Vec<_> = maps
                .iter()
                .filter(|row| row.values().any(|cell| cell_contains(cell, needle)))
                .cloned()
                .collect();
            let count = hits.len();
            (RowSet::Columnar(hits), count)
        }
        RowSet::Tabular { columns, rows } => {
            let hits: Vec<_> = rows
                .iter()
                .filter(|row| row.iter().any(|cell| cell_contains(cell, needle)))
                .cloned()
                .collect();
            let count = hits.len();
            (
                RowSet::Tabular {
                    columns: columns.clone(),
                    rows: hits,
                },
                count,
            )
        }
    }
}

fn cell_contains(cell: &Value, needle: &str) -> bool {
    cell_text(cell).to_lowercase().contains(needle)
}
