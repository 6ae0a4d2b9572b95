// # File Blob Store
//
// Directory-backed implementation of BlobStore.
//
// ## Purpose
//
// Keeps each blob as a file under a root directory, the key being the
// relative path. Stands in for an object store bucket on a single host.
//
// ## Crash Safety
//
// - Atomic writes: the body goes to a hidden temp file next to the target,
//   which is then renamed over it
// - Readers see either the old or the new body, never a torn write
//
// ## Conditional Writes
//
// Preconditions are checked and the rename performed under one in-process
// lock. Two processes writing the same root are not coordinated.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::blob_store::{
    BlobStore, BlobVersion, Precondition, StoredBlob, validate_key,
};

/// Directory-backed blob store with atomic replace
///
/// # Example
///
/// ```rust,no_run
/// use watermark_core::store::FileBlobStore;
/// use watermark_core::traits::{BlobStore, Precondition};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileBlobStore::new("/var/lib/watermark").await?;
///
///     // Written to /var/lib/watermark/meta/meta_file.csv via temp file + rename
///     store.put("meta/meta_file.csv", b"source_date,datetime_of_processing\n".to_vec(), Precondition::None).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            fs::create_dir_all(&root).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        } else if !root.is_dir() {
            return Err(Error::config(format!(
                "Store root {} is not a directory",
                root.display()
            )));
        }

        tracing::debug!("Opened file blob store at {}", root.display());
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path under the root
    fn path_for(&self, key: &str) -> Result<PathBuf, Error> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    /// Hidden sibling used for the write-then-rename
    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.tmp", name))
    }

    async fn read_blob(path: &Path) -> Result<Option<StoredBlob>, Error> {
        match fs::read(path).await {
            Ok(body) => Ok(Some(StoredBlob::new(body))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write_atomically(path: &Path, body: &[u8]) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = Self::temp_path(path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(body).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>, Error> {
        let path = self.path_for(key)?;
        Self::read_blob(&path).await
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> Result<BlobVersion, Error> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;

        if precondition != Precondition::None {
            let current = Self::read_blob(&path).await?.map(|blob| blob.version);
            if !precondition.holds(current) {
                return Err(Error::write_conflict(key));
            }
        }

        Self::write_atomically(&path, &body).await?;
        tracing::trace!("Blob written to file: {}", path.display());
        Ok(BlobVersion::of(&body))
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
