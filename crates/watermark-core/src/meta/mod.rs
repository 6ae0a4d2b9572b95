//! Meta log schema
//!
//! The meta log records which source dates have been processed and when.
//! It is a two-column table; the column names are part of the contract and
//! any other header makes the log malformed.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{Error, Result};

pub mod codec;
pub mod lookup;

pub use codec::{RawTable, TableFormat};
pub use lookup::{LogLookup, read_table, write_table};

/// Format of `source_date` cells and of date arguments
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format of `processed_at` cells
pub const PROCESSED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default name of the source date column
pub const DEFAULT_SOURCE_DATE_COLUMN: &str = "source_date";

/// Default name of the processing timestamp column
pub const DEFAULT_PROCESSED_AT_COLUMN: &str = "datetime_of_processing";

/// Column names of the meta log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaSchema {
    /// Column holding the processed calendar date
    #[serde(default = "default_source_date_column")]
    pub source_date_column: String,

    /// Column holding the processing timestamp
    #[serde(default = "default_processed_at_column")]
    pub processed_at_column: String,
}

impl MetaSchema {
    /// Create a schema with custom column names
    pub fn new(source_date_column: impl Into<String>, processed_at_column: impl Into<String>) -> Self {
        Self {
            source_date_column: source_date_column.into(),
            processed_at_column: processed_at_column.into(),
        }
    }

    /// Column names in write order
    pub fn columns(&self) -> Vec<String> {
        vec![
            self.source_date_column.clone(),
            self.processed_at_column.clone(),
        ]
    }

    /// Exact, case-sensitive multiset comparison against a header.
    pub fn matches(&self, header: &[String]) -> bool {
        let mut expected = self.columns();
        let mut found = header.to_vec();
        expected.sort();
        found.sort();
        expected == found
    }

    /// Validate the schema itself
    pub fn validate(&self) -> Result<()> {
        if self.source_date_column.is_empty() || self.processed_at_column.is_empty() {
            return Err(Error::config("Meta log column names cannot be empty"));
        }
        if self.source_date_column == self.processed_at_column {
            return Err(Error::config(format!(
                "Meta log columns must be distinct, both are '{}'",
                self.source_date_column
            )));
        }
        for column in self.columns() {
            if column.contains([',', '"', '\n', '\r']) {
                return Err(Error::config(format!(
                    "Meta log column name '{}' contains CSV control characters",
                    column
                )));
            }
        }
        Ok(())
    }
}

impl Default for MetaSchema {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_DATE_COLUMN, DEFAULT_PROCESSED_AT_COLUMN)
    }
}

fn default_source_date_column() -> String {
    DEFAULT_SOURCE_DATE_COLUMN.to_string()
}

fn default_processed_at_column() -> String {
    DEFAULT_PROCESSED_AT_COLUMN.to_string()
}

/// One row of the meta log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLogEntry {
    /// Calendar date that was processed
    pub source_date: NaiveDate,
    /// When the run covering `source_date` completed
    pub processed_at: NaiveDateTime,
}

impl MetaLogEntry {
    /// Create an entry
    pub fn new(source_date: NaiveDate, processed_at: NaiveDateTime) -> Self {
        Self {
            source_date,
            processed_at,
        }
    }
}

/// The whole meta log, in file order
///
/// Append-only: the same `source_date` may appear many times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaLog {
    entries: Vec<MetaLogEntry>,
}

impl MetaLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch stamped with a single processing timestamp
    pub fn batch(dates: &[NaiveDate], processed_at: NaiveDateTime) -> Self {
        Self {
            entries: dates
                .iter()
                .map(|date| MetaLogEntry::new(*date, processed_at))
                .collect(),
        }
    }

    /// Rows in file order
    pub fn entries(&self) -> &[MetaLogEntry] {
        &self.entries
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Distinct `source_date` values of a stored table
///
/// Only the source date column is read; `processed_at` cells are never
/// interpreted. Blank source dates are skipped. Any other unreadable cell
/// fails with `Error::MetaLogRow` naming its 1-based data line.
pub fn processed_dates(table: &RawTable, schema: &MetaSchema, key: &str) -> Result<BTreeSet<NaiveDate>> {
    let idx = table
        .column_index(&schema.source_date_column)
        .ok_or_else(|| Error::SchemaLookup {
            key: key.to_string(),
            expected: schema.columns(),
            found: table.columns.clone(),
        })?;

    let mut dates = BTreeSet::new();
    let mut blank = 0usize;
    for (i, row) in table.rows.iter().enumerate() {
        let cell = row.get(idx).map(|c| c.trim()).unwrap_or_default();
        if cell.is_empty() {
            blank += 1;
            continue;
        }
        let date = parse_source_date(cell).map_err(|e| {
            Error::meta_log_row(key, i as u64 + 1, format!("{}: {}", schema.source_date_column, e))
        })?;
        dates.insert(date);
    }

    if blank > 0 {
        debug!("Skipped {} row(s) without {} in meta log {}", blank, schema.source_date_column, key);
    }
    Ok(dates)
}

/// Parse a `YYYY-MM-DD` date argument
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|e| Error::malformed_date(input, format!("expected YYYY-MM-DD ({})", e)))
}

/// Render a date as `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Render a processing timestamp
pub fn format_processed_at(ts: NaiveDateTime) -> String {
    ts.format(PROCESSED_AT_FORMAT).to_string()
}

/// Source dates are usually bare dates, but a full timestamp is reduced to its date.
fn parse_source_date(cell: &str) -> std::result::Result<NaiveDate, String> {
    let cell = cell.trim();
    if let Ok(date) = NaiveDate::parse_from_str(cell, DATE_FORMAT) {
        return Ok(date);
    }
    parse_timestamp(cell)
        .map(|ts| ts.date())
        .ok_or_else(|| format!("'{}' is not a date", cell))
}

fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
}
