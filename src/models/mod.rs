//! Data models for the cached dataset.
//!
//! - `Dataset`: the full collection of named tables plus a freshness stamp
//! - `TableRecord`: one table's header text and row data
//! - `RowSet`: row storage, columnar (maps) or tabular (arrays), classified
//!   once at ingest

pub mod dataset;

pub use dataset::{ClassifyError, Dataset, RowSet, TableRecord, WireTable, NEVER_UPDATED};
