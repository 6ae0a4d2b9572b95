// # Memory Blob Store
//
// In-memory implementation of BlobStore.
//
// ## Purpose
//
// Provides a simple, fast blob store that doesn't persist across restarts.
// Useful for tests and for embedding the core in a process that manages the
// meta log's lifetime itself.
//
// ## Crash Behavior
//
// - All blobs are lost on restart/crash
// - The next run sees no meta log and resolves from the requested first date

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::blob_store::{
    BlobStore, BlobVersion, Precondition, StoredBlob, validate_key,
};

/// In-memory blob store implementation
///
/// Blobs live in a HashMap protected by a RwLock. Clones share the same map.
///
/// # Example
///
/// ```rust,no_run
/// use watermark_core::store::MemoryBlobStore;
/// use watermark_core::traits::{BlobStore, Precondition};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryBlobStore::new();
///
///     store.put("meta.csv", b"source_date,datetime_of_processing\n".to_vec(), Precondition::None).await?;
///     assert!(store.get("meta.csv").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<HashMap<String, StoredBlob>>>,
}

impl MemoryBlobStore {
    /// Create a new empty memory blob store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of blobs in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// List all keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>, Error> {
        validate_key(key)?;
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> Result<BlobVersion, Error> {
        validate_key(key)?;
        let mut guard = self.inner.write().await;

        let current = guard.get(key).map(|blob| blob.version);
        if !precondition.holds(current) {
            return Err(Error::write_conflict(key));
        }

        let blob = StoredBlob::new(body);
        let version = blob.version;
        guard.insert(key.to_string(), blob);
        Ok(version)
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryBlobStore::new();

        // Initially empty
        assert!(store.is_empty().await);
        assert_eq!(store.get("meta.csv").await.unwrap(), None);

        // Put and get
        let version = store
            .put("meta.csv", b"a,b\n".to_vec(), Precondition::None)
            .await
            .unwrap();
        let blob = store.get("meta.csv").await.unwrap().unwrap();
        assert_eq!(blob.body, b"a,b\n");
        assert_eq!(blob.version, version);
        assert_eq!(store.len().await, 1);

        // Unconditional put replaces
        store
            .put("meta.csv", b"a,b\n1,2\n".to_vec(), Precondition::None)
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("meta.csv").await.unwrap().unwrap().body, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_memory_store_preconditions() {
        let store = MemoryBlobStore::new();

        let v1 = store
            .put("meta.csv", b"one".to_vec(), Precondition::Absent)
            .await
            .unwrap();

        let err = store
            .put("meta.csv", b"again".to_vec(), Precondition::Absent)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WriteConflict { .. }));

        let v2 = store
            .put("meta.csv", b"two".to_vec(), Precondition::Matches(v1))
            .await
            .unwrap();

        let err = store
            .put("meta.csv", b"three".to_vec(), Precondition::Matches(v1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WriteConflict { .. }));

        assert_eq!(store.get("meta.csv").await.unwrap().unwrap().version, v2);
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state() {
        let store = MemoryBlobStore::new();
        let other = store.clone();

        store
            .put("b/meta.csv", b"x".to_vec(), Precondition::None)
            .await
            .unwrap();
        store
            .put("a/meta.csv", b"y".to_vec(), Precondition::None)
            .await
            .unwrap();

        assert_eq!(other.keys().await, vec!["a/meta.csv", "b/meta.csv"]);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_bad_keys() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.get("../meta.csv").await,
            Err(Error::InvalidKey(_))
        ));
    }
}
