//! Meta log merging
//!
//! [`LogMerger`] records a batch of processed dates in the meta log: it reads
//! the current log, checks its header, appends one row per date stamped with
//! a single processing timestamp, and writes the whole table back.
//!
//! Existing rows are never reinterpreted. Their cells and the header order
//! found in the file are written back unchanged, so the old body is a prefix
//! of the new one.
//!
//! ## Concurrency
//!
//! The read and the write are not atomic. With [`WriteMode::Overwrite`] two
//! concurrent merges race and the last writer wins, silently dropping the
//! other batch; callers must serialize merges per key. [`WriteMode::Conditional`]
//! turns the lost race into `Error::WriteConflict` instead.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock, whole_seconds};
use crate::config::{WatermarkConfig, WriteMode};
use crate::error::{Error, Result};
use crate::meta::{self, LogLookup, MetaLog, MetaSchema, RawTable, TableFormat, format_processed_at};
use crate::traits::{BlobStore, BlobVersion, Precondition};

/// Result of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No dates given, nothing written
    Skipped,

    /// No meta log existed; it now holds exactly the batch
    Created {
        /// Rows written
        rows: usize,
        /// Version of the new log
        version: BlobVersion,
    },

    /// The batch was appended after the existing rows
    Appended {
        /// Rows appended
        rows: usize,
        /// Rows in the log after the merge
        total: usize,
        /// Version of the new log
        version: BlobVersion,
    },
}

impl MergeOutcome {
    /// Rows added by this merge
    pub fn rows_added(&self) -> usize {
        match self {
            MergeOutcome::Skipped => 0,
            MergeOutcome::Created { rows, .. } | MergeOutcome::Appended { rows, .. } => *rows,
        }
    }

    /// True when the meta log was written
    pub fn wrote(&self) -> bool {
        !matches!(self, MergeOutcome::Skipped)
    }
}

/// Appends processed dates to the meta log
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use watermark_core::LogMerger;
/// use watermark_core::store::MemoryBlobStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let merger = LogMerger::new(Arc::new(MemoryBlobStore::new()), "meta_file.csv");
///
///     let outcome = merger.merge(&["2021-04-16", "2021-04-17"]).await?;
///     assert_eq!(outcome.rows_added(), 2);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct LogMerger {
    store: Arc<dyn BlobStore>,
    meta_key: String,
    schema: MetaSchema,
    format: TableFormat,
    write_mode: WriteMode,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LogMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogMerger")
            .field("store", &self.store.store_name())
            .field("meta_key", &self.meta_key)
            .field("schema", &self.schema)
            .field("format", &self.format)
            .field("write_mode", &self.write_mode)
            .field("clock", &self.clock)
            .finish()
    }
}

impl LogMerger {
    /// Create a merger for the meta log under `meta_key`
    pub fn new(store: Arc<dyn BlobStore>, meta_key: impl Into<String>) -> Self {
        Self {
            store,
            meta_key: meta_key.into(),
            schema: MetaSchema::default(),
            format: TableFormat::default(),
            write_mode: WriteMode::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a merger from configuration
    pub fn from_config(store: Arc<dyn BlobStore>, config: &WatermarkConfig) -> Self {
        Self::new(store, config.meta_key.clone())
            .with_schema(config.schema.clone())
            .with_format(config.format)
            .with_write_mode(config.write_mode)
    }

    /// Use a different clock for the processing timestamp
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use different column names
    pub fn with_schema(mut self, schema: MetaSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Use a different table format
    pub fn with_format(mut self, format: TableFormat) -> Self {
        self.format = format;
        self
    }

    /// Choose how the log is replaced
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Key of the meta log
    pub fn meta_key(&self) -> &str {
        &self.meta_key
    }

    /// Merge `YYYY-MM-DD` date strings
    ///
    /// Every string is parsed before the store is touched; one bad date
    /// fails the whole batch.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedDate`: a date does not parse
    /// - `Error::WrongMetaFile`: the existing log has a foreign header
    /// - `Error::WriteConflict`: conditional mode lost a race
    pub async fn merge<S: AsRef<str>>(&self, dates_processed: &[S]) -> Result<MergeOutcome> {
        let dates = dates_processed
            .iter()
            .map(|date| meta::parse_date(date.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.merge_dates(&dates).await
    }

    /// Merge already parsed dates
    pub async fn merge_dates(&self, dates: &[NaiveDate]) -> Result<MergeOutcome> {
        if dates.is_empty() {
            info!(
                "Nothing to write: no processed dates for meta log {}",
                self.meta_key
            );
            return Ok(MergeOutcome::Skipped);
        }

        let processed_at = whole_seconds(self.clock.now());
        let batch = MetaLog::batch(dates, processed_at);

        let lookup =
            meta::read_table(self.store.as_ref(), &self.meta_key, &self.schema, self.format)
                .await?;

        let (merged, precondition, existed) = match lookup {
            LogLookup::Found { mut table, version } => {
                debug!(
                    "Appending {} row(s) to meta log {} ({} existing)",
                    batch.len(),
                    self.meta_key,
                    table.len()
                );
                table.append_log(&batch, &self.schema);
                (table, Precondition::Matches(version), true)
            }
            LogLookup::NotFound => {
                debug!(
                    "No meta log at {}, creating it with {} row(s)",
                    self.meta_key,
                    batch.len()
                );
                (
                    RawTable::from_log(&batch, &self.schema),
                    Precondition::Absent,
                    false,
                )
            }
            LogLookup::Malformed { columns } => {
                return Err(Error::WrongMetaFile {
                    key: self.meta_key.clone(),
                    expected: self.schema.columns(),
                    found: columns,
                });
            }
        };

        let precondition = match self.write_mode {
            WriteMode::Overwrite => Precondition::None,
            WriteMode::Conditional => precondition,
        };

        let version = meta::write_table(
            self.store.as_ref(),
            &self.meta_key,
            &merged,
            self.format,
            precondition,
        )
        .await?;

        info!(
            "Recorded {} processed date(s) in meta log {} at {}",
            dates.len(),
            self.meta_key,
            format_processed_at(processed_at)
        );

        if existed {
            Ok(MergeOutcome::Appended {
                rows: dates.len(),
                total: merged.len(),
                version,
            })
        } else {
            Ok(MergeOutcome::Created {
                rows: dates.len(),
                version,
            })
        }
    }
}
