// # Meta Log Lookup
//
// Reading the meta log has three legitimate outcomes: it exists and matches
// the schema, it does not exist yet, or it exists with a foreign header.
// `LogLookup` makes the three explicit so callers branch exhaustively instead
// of catching a storage client's "no such key" error.

use tracing::{debug, trace};

use crate::error::Result;
use crate::meta::{MetaSchema, RawTable, TableFormat};
use crate::traits::{BlobStore, BlobVersion, Precondition};

/// Outcome of reading the meta log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLookup {
    /// The log exists and its header matches the schema
    Found {
        /// Header and rows as stored
        table: RawTable,
        /// Version of the blob the rows came from
        version: BlobVersion,
    },

    /// No blob under the key (first run)
    NotFound,

    /// The blob exists but its header does not match the schema
    Malformed {
        /// Header found in the blob
        columns: Vec<String>,
    },
}

/// Read and classify the meta log stored under `key`.
///
/// Only the header is checked; cells are left to the caller. Storage and
/// CSV framing failures are errors, a missing or malformed log is reported
/// through [`LogLookup`].
pub async fn read_table(
    store: &dyn BlobStore,
    key: &str,
    schema: &MetaSchema,
    format: TableFormat,
) -> Result<LogLookup> {
    let Some(blob) = store.get(key).await? else {
        debug!("Meta log {} not found in {} store", key, store.store_name());
        return Ok(LogLookup::NotFound);
    };

    let raw = format.decode(&blob.body)?;
    if !schema.matches(&raw.columns) {
        debug!(
            "Meta log {} has unexpected columns {:?}",
            key, raw.columns
        );
        return Ok(LogLookup::Malformed {
            columns: raw.columns,
        });
    }

    trace!(
        "Read meta log {} ({} rows, version {})",
        key,
        raw.len(),
        blob.version
    );
    Ok(LogLookup::Found {
        table: raw,
        version: blob.version,
    })
}

/// Replace the meta log stored under `key` with `table`.
pub async fn write_table(
    store: &dyn BlobStore,
    key: &str,
    table: &RawTable,
    format: TableFormat,
    precondition: Precondition,
) -> Result<BlobVersion> {
    let body = format.encode(table)?;
    let version = store.put(key, body, precondition).await?;
    trace!(
        "Wrote meta log {} ({} rows, version {})",
        key,
        table.len(),
        version
    );
    Ok(version)
}
