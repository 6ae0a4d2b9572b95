// # Blob Store Trait
//
// Defines the interface to the key/value blob storage that holds the meta log.
//
// ## Purpose
//
// The resolver and the merger never talk to a storage SDK directly. They read
// and replace whole blobs through this trait, which keeps them testable and
// lets any object store (S3, GCS, a local directory) sit behind them.
//
// ## Versions
//
// Every read returns a `BlobVersion`, a CRC32 of the stored bytes. A write may
// be conditioned on that version (or on the key being absent), which gives an
// ETag-style optimistic concurrency check. Stores that cannot honour a
// precondition must reject it instead of ignoring it.
//
// ## Implementations
//
// - In-memory: `MemoryBlobStore`
// - Directory on disk: `FileBlobStore`

use async_trait::async_trait;

use crate::Error;

/// Content version of a stored blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlobVersion(pub u32);

impl BlobVersion {
    /// Version of the given bytes
    pub fn of(body: &[u8]) -> Self {
        Self(crc32fast::hash(body))
    }
}

impl std::fmt::Display for BlobVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// A blob as returned by [`BlobStore::get`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Raw bytes
    pub body: Vec<u8>,
    /// Version of `body`
    pub version: BlobVersion,
}

impl StoredBlob {
    /// Wrap bytes, computing their version
    pub fn new(body: Vec<u8>) -> Self {
        let version = BlobVersion::of(&body);
        Self { body, version }
    }
}

/// Condition a write must satisfy before it replaces the blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precondition {
    /// Unconditional replace (last writer wins)
    #[default]
    None,
    /// The key must not exist yet
    Absent,
    /// The current blob must still have this version
    Matches(BlobVersion),
}

impl Precondition {
    /// Check the precondition against the version currently stored
    pub fn holds(&self, current: Option<BlobVersion>) -> bool {
        match (self, current) {
            (Precondition::None, _) => true,
            (Precondition::Absent, current) => current.is_none(),
            (Precondition::Matches(expected), Some(current)) => *expected == current,
            (Precondition::Matches(_), None) => false,
        }
    }
}

/// Trait for blob store implementations
///
/// Keys are relative, `/`-separated strings. See [`validate_key`] for the
/// exact rules every implementation enforces.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. The
/// core itself calls them strictly one after another.
///
/// ## Implementation Guidelines
///
/// - **Whole-blob semantics**: `put` replaces the blob entirely; readers never
///   observe a partially written body
/// - **Missing is not an error**: `get` on an unknown key returns `Ok(None)`
/// - **No retries**: fail fast and let the caller decide
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StoredBlob))`: The blob and its version
    /// - `Ok(None)`: No blob under this key
    /// - `Err(Error)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>, Error>;

    /// Replace the blob under `key`
    ///
    /// # Returns
    ///
    /// - `Ok(BlobVersion)`: Version of the newly written body
    /// - `Err(Error::WriteConflict)`: `precondition` did not hold, nothing written
    /// - `Err(Error)`: Storage error
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> Result<BlobVersion, Error>;

    /// Short name of the backend, used in log lines
    fn store_name(&self) -> &'static str;
}

/// Reject keys that are empty, absolute, or contain empty, `.` or `..` segments.
pub fn validate_key(key: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(Error::invalid_key("key cannot be empty"));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(Error::invalid_key(format!("key must be relative: '{}'", key)));
    }
    for segment in key.split('/') {
        match segment {
            "" => {
                return Err(Error::invalid_key(format!(
                    "key has an empty segment: '{}'",
                    key
                )));
            }
            "." | ".." => {
                return Err(Error::invalid_key(format!(
                    "key cannot contain '.' or '..' segments: '{}'",
                    key
                )));
            }
            s if s.contains('\\') => {
                return Err(Error::invalid_key(format!(
                    "key cannot contain backslashes: '{}'",
                    key
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
