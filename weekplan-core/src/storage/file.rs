//! One JSON file per calendar in a local directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::error::{WeekplanError, WeekplanResult};
use crate::storage::{Storage, calendar_id_from_name, file_name};

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, calendar_id: &str) -> PathBuf {
        self.dir.join(file_name(calendar_id))
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn read(&self, calendar_id: &str) -> WeekplanResult<Vec<u8>> {
        match fs::read(self.path(calendar_id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(WeekplanError::NotFound(calendar_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temp file and rename, so readers never see a
    /// half-written document.
    async fn write(&self, calendar_id: &str, bytes: &[u8]) -> WeekplanResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(calendar_id);
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            file_name(calendar_id),
            Uuid::new_v4().simple()
        ));

        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn exists(&self, calendar_id: &str) -> WeekplanResult<bool> {
        Ok(fs::try_exists(self.path(calendar_id)).await?)
    }

    async fn list(&self, prefix: &str) -> WeekplanResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(calendar_id_from_name) else {
                continue;
            };
            if id.starts_with(prefix) {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn describe(&self) -> String {
        format!("filesystem at {}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        store.write("abc123", br#"{"tasks":[]}"#).await.unwrap();
        assert_eq!(store.read("abc123").await.unwrap(), br#"{"tasks":[]}"#);
        assert!(store.exists("abc123").await.unwrap());
        assert!(dir.path().join("data/calendar_abc123.json").exists());

        store.write("abc123", b"{}").await.unwrap();
        assert_eq!(store.read("abc123").await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let err = store.read("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store.write("b2", b"{}").await.unwrap();
        store.write("a1", b"{}").await.unwrap();
        store.write("x9", b"{}").await.unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();

        assert_eq!(store.list("").await.unwrap(), vec!["a1", "b2", "x9"]);
        assert_eq!(store.list("a").await.unwrap(), vec!["a1"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("never-created"));
        assert!(store.list("").await.unwrap().is_empty());
    }
}
