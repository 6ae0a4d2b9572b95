//! Error types for the watermark core
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for watermark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the watermark core
#[derive(Error, Debug)]
pub enum Error {
    /// A date string could not be parsed as `YYYY-MM-DD`
    #[error("Malformed date '{input}': {reason}")]
    MalformedDate {
        /// The offending input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// The resolver found a meta log whose columns do not match the schema
    #[error("Meta log '{key}' has columns {found:?}, expected {expected:?}")]
    SchemaLookup {
        /// Key of the meta log
        key: String,
        /// Expected column names
        expected: Vec<String>,
        /// Column names found in the header
        found: Vec<String>,
    },

    /// The merger found a meta log whose columns do not match the schema
    #[error("Wrong meta file '{key}': columns {found:?} do not match {expected:?}")]
    WrongMetaFile {
        /// Key of the meta log
        key: String,
        /// Expected column names
        expected: Vec<String>,
        /// Column names found in the header
        found: Vec<String>,
    },

    /// Header is fine but a data row is not
    #[error("Meta log '{key}' line {line}: {message}")]
    MetaLogRow {
        /// Key of the meta log
        key: String,
        /// 1-based data line (header excluded)
        line: u64,
        /// What went wrong
        message: String,
    },

    /// Unsupported table format
    #[error("Unsupported table format: {0}")]
    WrongFormat(String),

    /// A conditional write lost a race with another writer
    #[error("Write conflict on '{key}': the blob changed since it was read")]
    WriteConflict {
        /// Key of the blob
        key: String,
    },

    /// Blob key rejected by the store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Store-related errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// CSV encoding/decoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a malformed date error
    pub fn malformed_date(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDate {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a meta log row error
    pub fn meta_log_row(key: impl Into<String>, line: u64, message: impl Into<String>) -> Self {
        Self::MetaLogRow {
            key: key.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a write conflict error
    pub fn write_conflict(key: impl Into<String>) -> Self {
        Self::WriteConflict { key: key.into() }
    }

    /// Create an invalid key error
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for both flavours of column schema mismatch
    pub fn is_malformed_schema(&self) -> bool {
        matches!(self, Self::SchemaLookup { .. } | Self::WrongMetaFile { .. })
    }

    /// True when the caller handed in something unusable
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedDate { .. } | Self::MetaLogRow { .. })
    }
}
