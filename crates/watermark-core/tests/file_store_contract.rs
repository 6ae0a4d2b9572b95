//! Contract Test: File Store Persistence
//!
//! This test verifies that a meta log written through the file store
//! survives the process and is readable by a freshly opened store.
//!
//! Constraints verified:
//! - Configuration drives store selection, key and column names
//! - Nested keys land in nested directories
//! - A reopened store sees every merged row
//! - No temp files are left behind after a merge

mod common;

use common::*;
use std::collections::BTreeSet;
use watermark_core::{
    BlobStore, GapResolver, LogMerger, MetaSchema, StoreConfig, Watermark, WatermarkConfig,
    open_store,
};

fn file_config(root: &std::path::Path) -> WatermarkConfig {
    WatermarkConfig::new(StoreConfig::File {
        root: root.to_string_lossy().into_owned(),
    })
    .with_meta_key("jobs/daily/meta_file.csv")
}

#[tokio::test]
async fn merged_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());
    config.validate().unwrap();

    {
        let store = open_store(&config.store).await.unwrap();
        LogMerger::from_config(store, &config)
            .with_clock(clock_at(days_ago(3)))
            .merge(&range_str(6, 3))
            .await
            .unwrap();
    }

    let path = dir.path().join("jobs").join("daily").join("meta_file.csv");
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("source_date,datetime_of_processing\n"));
    assert_eq!(content.lines().count(), 5);

    let store = open_store(&config.store).await.unwrap();
    let resolution = GapResolver::from_config(store, &config)
        .with_clock(clock())
        .resolve(&days_ago_str(6))
        .await
        .unwrap();

    // D-6..D-3 are covered, D-2 is the first gap.
    assert_eq!(resolution.min_date, Watermark::Resume(days_ago(3)));
    assert_eq!(resolution.date_strings(), range_str(3, 0));
}

#[tokio::test]
async fn no_temp_files_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());
    let store = open_store(&config.store).await.unwrap();
    let merger = LogMerger::from_config(store, &config).with_clock(clock());

    merger.merge(&[days_ago_str(2)]).await.unwrap();
    merger.merge(&[days_ago_str(1)]).await.unwrap();

    let names: BTreeSet<_> = std::fs::read_dir(dir.path().join("jobs").join("daily"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, BTreeSet::from(["meta_file.csv".to_string()]));
}

#[tokio::test]
async fn custom_columns_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path()).with_schema(MetaSchema::new("day", "loaded_at"));
    let store = open_store(&config.store).await.unwrap();

    LogMerger::from_config(store.clone(), &config)
        .with_clock(clock())
        .merge(&[days_ago_str(1), days_ago_str(0)])
        .await
        .unwrap();

    let content =
        std::fs::read_to_string(dir.path().join("jobs").join("daily").join("meta_file.csv"))
            .unwrap();
    assert!(content.starts_with("day,loaded_at\n"));

    let resolution = GapResolver::from_config(store.clone(), &config)
        .with_clock(clock())
        .resolve(&days_ago_str(1))
        .await
        .unwrap();
    assert_eq!(resolution.min_date, Watermark::UpToDate);

    // The default column names no longer match this log.
    let err = GapResolver::new(store, config.meta_key.clone())
        .with_clock(clock())
        .resolve(&days_ago_str(1))
        .await
        .unwrap_err();
    assert!(err.is_malformed_schema());
}

#[tokio::test]
async fn config_from_json_drives_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let json = serde_json::json!({
        "meta_key": "meta_file.csv",
        "store": { "type": "file", "root": dir.path().to_string_lossy() },
        "write_mode": "conditional"
    })
    .to_string();

    let config = WatermarkConfig::from_json(&json).unwrap();
    let store = open_store(&config.store).await.unwrap();
    assert_eq!(store.store_name(), "file");

    let merger = LogMerger::from_config(store, &config).with_clock(clock());
    merger.merge(&[days_ago_str(1)]).await.unwrap();
    merger.merge(&[days_ago_str(0)]).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("meta_file.csv")).unwrap();
    assert_eq!(content.lines().count(), 3);
}
