// # watermark-core
//
// Watermark reconciliation for date-partitioned batch jobs.
//
// ## Architecture Overview
//
// - **GapResolver**: Reads the meta log and computes the earliest date that
//   must be (re)processed plus every date from there through today
// - **LogMerger**: Appends a batch of processed dates to the meta log and
//   replaces it in one write
// - **BlobStore**: Trait for the key/value storage holding the meta log
// - **meta**: Meta log schema, CSV codec and the tagged `LogLookup`
//
// The resolver and the merger do not know about each other; they share only
// the meta log schema.
//
// ## Design Principles
//
// 1. **No silent repair**: A meta log with a foreign header is an error, never rewritten
// 2. **Missing is normal**: An absent meta log is the first-run state, not a failure
// 3. **Fail before I/O**: Malformed date input is rejected before storage is touched
// 4. **Library-First**: No environment variables or global state in the core

pub mod clock;
pub mod config;
pub mod error;
pub mod merger;
pub mod meta;
pub mod resolver;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{StoreConfig, WatermarkConfig, WriteMode};
pub use error::{Error, Result};
pub use merger::{LogMerger, MergeOutcome};
pub use meta::{LogLookup, MetaLog, MetaLogEntry, MetaSchema, RawTable, TableFormat};
pub use resolver::{GapResolver, Resolution, UP_TO_DATE_SENTINEL, Watermark, widen_lower_bound};
pub use store::{FileBlobStore, MemoryBlobStore, open_store};
pub use traits::{BlobStore, BlobVersion, Precondition, StoredBlob};
