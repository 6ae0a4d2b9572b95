//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that count storage access and
//! simulate concurrent writers, plus calendar helpers pinned to a fixed today.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use watermark_core::error::Result;
use watermark_core::meta::{self, LogLookup, MetaSchema, RawTable, TableFormat};
use watermark_core::traits::{BlobStore, BlobVersion, Precondition, StoredBlob};
use watermark_core::{FixedClock, GapResolver, LogMerger, MemoryBlobStore};

/// The fixed "today" every contract test runs against
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 4, 18).unwrap()
}

/// `today() - days`
pub fn days_ago(days: i64) -> NaiveDate {
    today() - Duration::days(days)
}

/// `days_ago(days)` as `YYYY-MM-DD`
pub fn days_ago_str(days: i64) -> String {
    meta::format_date(days_ago(days))
}

/// Dates `days_ago(from)` through `days_ago(to)`, as strings, oldest first
pub fn range_str(from: i64, to: i64) -> Vec<String> {
    (to..=from).rev().map(days_ago_str).collect()
}

/// Clock pinned to noon today
pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at_date(today()))
}

/// Clock pinned to noon on `date`
pub fn clock_at(date: NaiveDate) -> Arc<FixedClock> {
    Arc::new(FixedClock::at_date(date))
}

/// Resolver over `store` with the fixed clock
pub fn resolver(store: Arc<dyn BlobStore>, key: &str) -> GapResolver {
    GapResolver::new(store, key).with_clock(clock())
}

/// Merger over `store` with a clock pinned to `date`
pub fn merger_at(store: Arc<dyn BlobStore>, key: &str, date: NaiveDate) -> LogMerger {
    LogMerger::new(store, key).with_clock(clock_at(date))
}

/// Put raw content under `key`
pub async fn seed(store: &dyn BlobStore, key: &str, content: &str) {
    store
        .put(key, content.as_bytes().to_vec(), Precondition::None)
        .await
        .expect("seeding succeeds");
}

/// Read the log under `key`, panicking unless it exists and is well-formed
pub async fn read_log(store: &dyn BlobStore, key: &str) -> RawTable {
    match meta::read_table(store, key, &MetaSchema::default(), TableFormat::Csv)
        .await
        .expect("read succeeds")
    {
        LogLookup::Found { table, .. } => table,
        other => panic!("expected a well-formed meta log, got {:?}", other),
    }
}

/// Distinct source dates in `table`
pub fn logged_dates(table: &RawTable) -> BTreeSet<NaiveDate> {
    meta::processed_dates(table, &MetaSchema::default(), "test").expect("source dates parse")
}

/// Cells of column `name`, in row order
pub fn column(table: &RawTable, name: &str) -> Vec<String> {
    let idx = table.column_index(name).expect("column exists");
    table.rows.iter().map(|row| row[idx].clone()).collect()
}

/// A BlobStore that counts calls
pub struct CountingBlobStore {
    inner: MemoryBlobStore,
    get_call_count: Arc<AtomicUsize>,
    put_call_count: Arc<AtomicUsize>,
}

impl CountingBlobStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            get_call_count: Arc::new(AtomicUsize::new(0)),
            put_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times get() was called
    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times put() was called
    pub fn put_call_count(&self) -> usize {
        self.put_call_count.load(Ordering::SeqCst)
    }

    /// Create a new CountingBlobStore that shares blobs and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            get_call_count: Arc::clone(&other.get_call_count),
            put_call_count: Arc::clone(&other.put_call_count),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for CountingBlobStore {
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>, precondition: Precondition) -> Result<BlobVersion> {
        self.put_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, body, precondition).await
    }

    fn store_name(&self) -> &'static str {
        "counting"
    }
}

/// A BlobStore where another writer replaces the blob right after our first read
///
/// Simulates a merge from a second job landing between our read and our write.
pub struct InterleavedWriterStore {
    inner: MemoryBlobStore,
    intruder_body: Vec<u8>,
    fired: AtomicBool,
}

impl InterleavedWriterStore {
    pub fn new(inner: MemoryBlobStore, intruder_body: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            intruder_body: intruder_body.into(),
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for InterleavedWriterStore {
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
        let blob = self.inner.get(key).await?;
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.inner
                .put(key, self.intruder_body.clone(), Precondition::None)
                .await?;
        }
        Ok(blob)
    }

    async fn put(&self, key: &str, body: Vec<u8>, precondition: Precondition) -> Result<BlobVersion> {
        self.inner.put(key, body, precondition).await
    }

    fn store_name(&self) -> &'static str {
        "interleaved"
    }
}
