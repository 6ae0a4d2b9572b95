// # Blob Store Implementations
//
// This module provides implementations of the BlobStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::BlobStore;

/// Build the store described by `config`
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn BlobStore>> {
    config.validate()?;
    match config {
        StoreConfig::File { root } => Ok(Arc::new(FileBlobStore::new(root).await?)),
        StoreConfig::Memory => Ok(Arc::new(MemoryBlobStore::new())),
    }
}
