//! Core traits for the watermark core
//!
//! - [`BlobStore`]: Whole-blob key/value storage holding the meta log

pub mod blob_store;

pub use blob_store::{BlobStore, BlobVersion, Precondition, StoredBlob, validate_key};
