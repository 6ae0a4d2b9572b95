//! Gap resolution
//!
//! Given the earliest date a caller is interested in and the meta log,
//! [`GapResolver`] works out where processing has to resume (the watermark)
//! and which calendar dates, up to and including today, must be fetched.
//!
//! ## Algorithm
//!
//! ```text
//!   first_date - 1          first_date                      today
//!        │                      │                             │
//!        ▼                      ▼                             ▼
//!     [bound] [ d ] [ d ] [ d ] [gap] [ d ] [gap] ...       [ ? ]
//!                                 │
//!                   min_date = first gap - 1 day
//! ```
//!
//! 1. Widen the request by one day (`widen_lower_bound`); that extra day is
//!    the boundary day.
//! 2. No meta log: everything from the boundary day to today is returned.
//! 3. Meta log present: only its `source_date` column is read. Find the
//!    earliest date after the boundary day that was never processed. Resume one day before it, so a partially processed boundary
//!    day is redone.
//! 4. Nothing missing: the watermark is [`Watermark::UpToDate`].

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::WatermarkConfig;
use crate::error::{Error, Result};
use crate::meta::{self, LogLookup, MetaSchema, TableFormat, format_date};
use crate::traits::BlobStore;

/// Literal rendering of [`Watermark::UpToDate`]
///
/// Downstream consumers compare against this string, so it must not change.
pub const UP_TO_DATE_SENTINEL: &str = "2200-01-01";

/// Where processing has to resume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// Resume processing at this date
    Resume(NaiveDate),

    /// Every date in the window is already processed
    UpToDate,
}

impl Watermark {
    /// The resume date, if there is anything to do
    pub fn resume_date(&self) -> Option<NaiveDate> {
        match self {
            Watermark::Resume(date) => Some(*date),
            Watermark::UpToDate => None,
        }
    }

    /// The watermark as a date, `UpToDate` mapping to the far-future sentinel
    pub fn as_date(&self) -> NaiveDate {
        match self {
            Watermark::Resume(date) => *date,
            Watermark::UpToDate => sentinel_date(),
        }
    }

    /// True when nothing is left to process
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Watermark::UpToDate)
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Watermark::Resume(date) => f.write_str(&format_date(*date)),
            Watermark::UpToDate => f.write_str(UP_TO_DATE_SENTINEL),
        }
    }
}

fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2200, 1, 1).unwrap_or(NaiveDate::MAX)
}

/// Result of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Earliest date that must be (re)processed
    pub min_date: Watermark,

    /// Dates to fetch, ascending, ending today
    pub dates: Vec<NaiveDate>,
}

impl Resolution {
    /// `min_date` as `YYYY-MM-DD`
    pub fn min_date_string(&self) -> String {
        self.min_date.to_string()
    }

    /// `dates` as `YYYY-MM-DD` strings
    pub fn date_strings(&self) -> Vec<String> {
        self.dates.iter().copied().map(format_date).collect()
    }

    /// True when there is nothing to fetch
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// The day before `first_date`: the boundary day.
pub fn widen_lower_bound(first_date: NaiveDate) -> Result<NaiveDate> {
    first_date.pred_opt().ok_or_else(|| {
        Error::malformed_date(
            format_date(first_date),
            "no calendar date precedes it",
        )
    })
}

/// Consecutive dates from `start` through `today`, both inclusive.
///
/// Empty when `start` is after `today`.
pub fn candidate_interval(start: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= today).collect()
}

/// Resolve against an already-read set of processed dates.
///
/// `processed` is `None` when no meta log exists.
pub fn resolve_dates(
    first_date: NaiveDate,
    today: NaiveDate,
    processed: Option<&BTreeSet<NaiveDate>>,
) -> Result<Resolution> {
    let start = widen_lower_bound(first_date)?;
    let interval = candidate_interval(start, today);

    let Some(processed) = processed else {
        return Ok(Resolution {
            min_date: Watermark::Resume(first_date),
            dates: interval,
        });
    };

    // The boundary day itself never counts as missing.
    let first_gap = interval
        .iter()
        .skip(1)
        .find(|date| !processed.contains(*date));

    match first_gap {
        Some(gap) => {
            let min_date = widen_lower_bound(*gap)?;
            let dates = interval.into_iter().filter(|d| *d >= min_date).collect();
            Ok(Resolution {
                min_date: Watermark::Resume(min_date),
                dates,
            })
        }
        None => Ok(Resolution {
            min_date: Watermark::UpToDate,
            dates: Vec::new(),
        }),
    }
}

/// Computes the watermark and the dates to process from the meta log
///
/// The resolver only reads the meta log; it never writes.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use watermark_core::GapResolver;
/// use watermark_core::store::MemoryBlobStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let resolver = GapResolver::new(Arc::new(MemoryBlobStore::new()), "meta_file.csv");
///
///     let resolution = resolver.resolve("2021-04-12").await?;
///     println!("{} -> {:?}", resolution.min_date, resolution.date_strings());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct GapResolver {
    store: Arc<dyn BlobStore>,
    meta_key: String,
    schema: MetaSchema,
    format: TableFormat,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for GapResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GapResolver")
            .field("store", &self.store.store_name())
            .field("meta_key", &self.meta_key)
            .field("schema", &self.schema)
            .field("format", &self.format)
            .field("clock", &self.clock)
            .finish()
    }
}

impl GapResolver {
    /// Create a resolver for the meta log under `meta_key`
    pub fn new(store: Arc<dyn BlobStore>, meta_key: impl Into<String>) -> Self {
        Self {
            store,
            meta_key: meta_key.into(),
            schema: MetaSchema::default(),
            format: TableFormat::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a resolver from configuration
    pub fn from_config(store: Arc<dyn BlobStore>, config: &WatermarkConfig) -> Self {
        Self::new(store, config.meta_key.clone())
            .with_schema(config.schema.clone())
            .with_format(config.format)
    }

    /// Use a different clock for "today"
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

    /// Key of the meta log
    pub fn meta_key(&self) -> &str {
        &self.meta_key
    }

    /// Resolve from a `YYYY-MM-DD` first date
    ///
    /// # Errors
    ///
    /// - `Error::MalformedDate`: `first_date` does not parse (the store is not touched)
    /// - `Error::SchemaLookup`: the meta log header does not match the schema
    /// - `Error::MetaLogRow`: a non-blank `source_date` cell is not a date
    /// - Store errors are passed through unchanged
    pub async fn resolve(&self, first_date: &str) -> Result<Resolution> {
        let first_date = meta::parse_date(first_date)?;
        self.resolve_from(first_date).await
    }

    /// Resolve from an already parsed first date
    pub async fn resolve_from(&self, first_date: NaiveDate) -> Result<Resolution> {
        // Fail on an unusable date before any storage access.
        widen_lower_bound(first_date)?;
        let today = self.clock.today();

        let lookup =
            meta::read_table(self.store.as_ref(), &self.meta_key, &self.schema, self.format)
                .await?;

        let resolution = match lookup {
            LogLookup::NotFound => {
                info!(
                    "No meta log at {}, processing everything from {}",
                    self.meta_key,
                    format_date(first_date)
                );
                resolve_dates(first_date, today, None)?
            }
            LogLookup::Found { table, .. } => {
                let processed = meta::processed_dates(&table, &self.schema, &self.meta_key)?;
                debug!(
                    "Meta log {} covers {} distinct dates",
                    self.meta_key,
                    processed.len()
                );
                resolve_dates(first_date, today, Some(&processed))?
            }
            LogLookup::Malformed { columns } => {
                return Err(Error::SchemaLookup {
                    key: self.meta_key.clone(),
                    expected: self.schema.columns(),
                    found: columns,
                });
            }
        };

        match resolution.min_date {
            Watermark::UpToDate => info!(
                "All dates from {} to {} already processed",
                format_date(first_date),
                format_date(today)
            ),
            Watermark::Resume(min_date) => info!(
                "Resuming at {}: {} date(s) to process through {}",
                format_date(min_date),
                resolution.dates.len(),
                format_date(today)
            ),
        }

        Ok(resolution)
    }
}
