//! Key/value persistence for calendar documents.
//!
//! Every backend stores one opaque blob per calendar ID under the name
//! `calendar_<id>.json`. Backends know nothing about the document inside.

mod file;
mod object;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StorageConfig;
use crate::error::WeekplanResult;

pub use file::FileStore;
pub use object::ObjectStorage;

const FILE_PREFIX: &str = "calendar_";
const FILE_SUFFIX: &str = ".json";

/// Blob name for a calendar ID.
pub fn file_name(calendar_id: &str) -> String {
    format!("{}{}{}", FILE_PREFIX, calendar_id, FILE_SUFFIX)
}

/// Calendar ID encoded in a blob name, if it is one of ours.
pub fn calendar_id_from_name(name: &str) -> Option<&str> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)
        .filter(|id| !id.is_empty())
}

/// Uniform read/write/exists/list over calendar blobs.
///
/// `read` fails with [`WeekplanError::NotFound`](crate::WeekplanError::NotFound)
/// when nothing is stored under the ID; every other failure is a different
/// variant so callers can treat "no calendar yet" as an empty state.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, calendar_id: &str) -> WeekplanResult<Vec<u8>>;

    async fn write(&self, calendar_id: &str, bytes: &[u8]) -> WeekplanResult<()>;

    async fn exists(&self, calendar_id: &str) -> WeekplanResult<bool>;

    /// Calendar IDs starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> WeekplanResult<Vec<String>>;

    /// Short backend name for logs.
    fn describe(&self) -> String;
}

/// Build the configured backend.
pub fn from_config(config: &StorageConfig) -> WeekplanResult<Arc<dyn Storage>> {
    match config {
        StorageConfig::Filesystem { .. } => Ok(Arc::new(FileStore::new(config.data_dir()?))),
        StorageConfig::S3 { .. } => Ok(Arc::new(ObjectStorage::from_config(config)?)),
    }
}
