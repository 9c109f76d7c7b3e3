//! S3-compatible object storage, one object per calendar.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

use crate::config::StorageConfig;
use crate::error::{WeekplanError, WeekplanResult};
use crate::storage::{Storage, calendar_id_from_name, file_name};

pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    prefix: Option<Path>,
    label: String,
}

fn storage_err(e: object_store::Error) -> WeekplanError {
    WeekplanError::Storage(e.to_string())
}

impl ObjectStorage {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<&str>, label: impl Into<String>) -> Self {
        ObjectStorage {
            store,
            prefix: prefix.filter(|p| !p.is_empty()).map(Path::from),
            label: label.into(),
        }
    }

    /// Build an S3 client. Anything left unset in the config falls back
    /// to the standard `AWS_*` environment variables.
    pub fn from_config(config: &StorageConfig) -> WeekplanResult<Self> {
        let StorageConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            prefix,
            allow_http,
        } = config
        else {
            return Err(WeekplanError::Config("not an s3 storage config".into()));
        };

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .with_allow_http(*allow_http);
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key) = access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder.build().map_err(|e| WeekplanError::Config(e.to_string()))?;
        Ok(Self::new(Arc::new(store), prefix.as_deref(), format!("s3://{}", bucket)))
    }

    fn path(&self, calendar_id: &str) -> Path {
        match &self.prefix {
            Some(prefix) => prefix.child(file_name(calendar_id)),
            None => Path::from(file_name(calendar_id)),
        }
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn read(&self, calendar_id: &str) -> WeekplanResult<Vec<u8>> {
        let result = match self.store.get(&self.path(calendar_id)).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(WeekplanError::NotFound(calendar_id.to_string()));
            }
            Err(e) => return Err(storage_err(e)),
        };
        let bytes = result.bytes().await.map_err(storage_err)?;
        Ok(bytes.to_vec())
    }

    async fn write(&self, calendar_id: &str, bytes: &[u8]) -> WeekplanResult<()> {
        self.store
            .put(&self.path(calendar_id), PutPayload::from(bytes.to_vec()))
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn exists(&self, calendar_id: &str) -> WeekplanResult<bool> {
        match self.store.head(&self.path(calendar_id)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// The listing stream follows continuation tokens, so every page is
    /// visited.
    async fn list(&self, prefix: &str) -> WeekplanResult<Vec<String>> {
        let objects: Vec<_> = self
            .store
            .list(self.prefix.as_ref())
            .try_collect()
            .await
            .map_err(storage_err)?;

        let mut ids: Vec<String> = objects
            .iter()
            .filter_map(|meta| meta.location.filename())
            .filter_map(calendar_id_from_name)
            .filter(|id| id.starts_with(prefix))
            .map(str::to_string)
            .collect();

        ids.sort();
        Ok(ids)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn store(prefix: Option<&str>) -> (ObjectStorage, Arc<InMemory>) {
        let memory = Arc::new(InMemory::new());
        (ObjectStorage::new(memory.clone(), prefix, "memory"), memory)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (storage, _) = store(None);
        storage.write("abc123", br#"{"tasks":[]}"#).await.unwrap();
        assert_eq!(storage.read("abc123").await.unwrap(), br#"{"tasks":[]}"#);
        assert!(storage.exists("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let (storage, _) = store(None);
        assert!(storage.read("nope").await.unwrap_err().is_not_found());
        assert!(!storage.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_prefix_namespaces_objects() {
        let (storage, memory) = store(Some("weekplan"));
        storage.write("b2", b"{}").await.unwrap();
        storage.write("a1", b"{}").await.unwrap();

        memory
            .put(&Path::from("other/calendar_zz.json"), PutPayload::from_static(b"{}"))
            .await
            .unwrap();
        assert!(memory.head(&Path::from("weekplan/calendar_a1.json")).await.is_ok());

        assert_eq!(storage.list("").await.unwrap(), vec!["a1", "b2"]);
        assert_eq!(storage.list("b").await.unwrap(), vec!["b2"]);
    }
}
