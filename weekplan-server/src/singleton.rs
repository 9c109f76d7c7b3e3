//! Singleton pattern to ensure only one weekplan-server writes a data directory.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// A lock guard that releases the lock when dropped
pub struct LockGuard {
    _file: File,
}

fn lock_path(data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    Ok(data_dir.join(".server.lock"))
}

/// Acquire an exclusive lock on `data_dir`, failing if another instance
/// is serving it
pub fn acquire_lock(data_dir: &Path) -> Result<LockGuard> {
    let path = lock_path(data_dir)?;
    let file = File::create(&path).context("Failed to create lock file")?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "Another weekplan-server instance is already serving {}.\n\
            If you believe this is an error, remove: {}",
            data_dir.display(),
            path.display()
        )
    })?;

    Ok(LockGuard { _file: file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_fails() {
        let dir = TempDir::new().unwrap();
        let _first = acquire_lock(dir.path()).unwrap();
        assert!(acquire_lock(dir.path()).is_err());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        drop(acquire_lock(dir.path()).unwrap());
        assert!(acquire_lock(dir.path()).is_ok());
    }
}
