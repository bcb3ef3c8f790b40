//! The dataset snapshot model: named tables plus a freshness stamp.
//!
//! A `Dataset` is immutable once published. Refresh never merges into an
//! existing snapshot; it builds a new `Dataset` and swaps the shared
//! reference, so readers iterating an old snapshot are unaffected.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::utils::cell_text;

/// Sentinel freshness stamp for a dataset that has never been refreshed.
pub const NEVER_UPDATED: &str = "Never";

/// Row classification failure for a single table body.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("table body is not an array")]
    NotAnArray,

    #[error("row 0 must be an object or an array, got {0}")]
    UnsupportedRow(&'static str),

    #[error("row {0} does not match the encoding set by row 0")]
    MixedEncoding(usize),
}

/// Row storage for one table, resolved once at ingest.
///
/// The wire format carries rows either as uniform objects (columnar) or as
/// nested arrays (tabular). The first element decides which rule applies to
/// the whole set; the variant is fixed here so readers never re-infer it.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSet {
    /// Uniform key/value rows. Columns are the first row's keys.
    Columnar(Vec<Map<String, Value>>),
    /// Positional rows. `columns` holds the wire's column-name row when one
    /// was present; a single-row table arrives with no name row and columns
    /// are synthesized for display.
    Tabular {
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Value>>,
    },
}

impl RowSet {
    /// Classify a wire `table` value into its row encoding.
    pub fn from_wire(value: Value) -> Result<Self, ClassifyError> {
        let items = match value {
            Value::Array(items) => items,
            _ => return Err(ClassifyError::NotAnArray),
        };

        match items.first() {
            None => Ok(RowSet::Tabular {
                columns: None,
                rows: Vec::new(),
            }),
            Some(Value::Object(_)) => {
                let mut rows = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(map) => rows.push(map),
                        _ => return Err(ClassifyError::MixedEncoding(i)),
                    }
                }
                Ok(RowSet::Columnar(rows))
            }
            Some(Value::Array(_)) => {
                let mut rows = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Array(cells) => rows.push(cells),
                        _ => return Err(ClassifyError::MixedEncoding(i)),
                    }
                }
                // More than one row: row 0 is the column-name row. Exactly
                // one row: it is data, and columns get synthesized later.
                if rows.len() > 1 {
                    let names = rows.remove(0).iter().map(cell_text).collect();
                    Ok(RowSet::Tabular {
                        columns: Some(names),
                        rows,
                    })
                } else {
                    Ok(RowSet::Tabular {
                        columns: None,
                        rows,
                    })
                }
            }
            Some(other) => Err(ClassifyError::UnsupportedRow(json_kind(other))),
        }
    }

    /// Serialize back to the wire `table` shape, byte-faithful to what was
    /// ingested (a synthesized column row is never written out).
    pub fn to_wire(&self) -> Value {
        match self {
            RowSet::Columnar(rows) => {
                Value::Array(rows.iter().cloned().map(Value::Object).collect())
            }
            RowSet::Tabular { columns, rows } => {
                let mut out = Vec::with_capacity(rows.len() + 1);
                if let Some(names) = columns {
                    out.push(Value::Array(
                        names.iter().cloned().map(Value::String).collect(),
                    ));
                }
                out.extend(rows.iter().cloned().map(Value::Array));
                Value::Array(out)
            }
        }
    }

    /// Column names for display: the first row's keys (columnar), the stored
    /// name row (tabular), or `"Col 1"…"Col N"` when none was present.
    pub fn column_names(&self) -> Vec<String> {
        match self {
            RowSet::Columnar(rows) => rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default(),
            RowSet::Tabular {
                columns: Some(names),
                ..
            } => names.clone(),
            RowSet::Tabular { columns: None, rows } => {
                let width = rows.first().map(Vec::len).unwrap_or(0);
                (1..=width).map(|i| format!("Col {}", i)).collect()
            }
        }
    }

    /// Number of data rows (the column-name row is not data).
    pub fn len(&self) -> usize {
        match self {
            RowSet::Columnar(rows) => rows.len(),
            RowSet::Tabular { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Wire/persisted shape of one table: `{ "header": ..., "table": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTable {
    pub header: String,
    pub table: Value,
}

/// One named table: its header text plus classified row data.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRecord {
    pub header: String,
    pub rows: RowSet,
}

impl TableRecord {
    pub fn from_wire(wire: WireTable) -> Result<Self, ClassifyError> {
        Ok(Self {
            header: wire.header,
            rows: RowSet::from_wire(wire.table)?,
        })
    }

    pub fn to_wire(&self) -> WireTable {
        WireTable {
            header: self.header.clone(),
            table: self.rows.to_wire(),
        }
    }
}

impl Serialize for TableRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TableRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireTable::deserialize(deserializer)?;
        TableRecord::from_wire(wire).map_err(D::Error::custom)
    }
}

/// The full collection of named tables plus one dataset-wide freshness stamp.
///
/// `last_updated` describes the whole dataset, not individual tables. It is
/// an origin-defined string and is only ever interpreted as a date inside
/// the freshness comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub tables: BTreeMap<String, TableRecord>,
    #[serde(default = "default_last_updated")]
    pub last_updated: String,
}

fn default_last_updated() -> String {
    NEVER_UPDATED.to_string()
}

impl Default for Dataset {
    fn default() -> Self {
        Self::empty()
    }
}

impl Dataset {
    pub fn empty() -> Self {
        Self {
            tables: BTreeMap::new(),
            last_updated: default_last_updated(),
        }
    }

    pub fn new(tables: BTreeMap<String, TableRecord>, last_updated: impl Into<String>) -> Self {
        Self {
            tables,
            last_updated: last_updated.into(),
        }
    }

    /// True when no tables are held at all (freshness stamp aside).
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
