//! Server configuration.
//!
//! Loaded from `~/.config/weekplan/server.toml`, then overridden by
//! `WEEKPLAN__*` environment variables (e.g. `WEEKPLAN__PORT=8080`,
//! `WEEKPLAN__STORAGE__BACKEND=s3`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{WeekplanError, WeekplanResult};

static DEFAULT_DATA_DIR: &str = "~/.local/share/weekplan";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Where calendar documents live. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Filesystem {
        #[serde(default = "default_data_dir")]
        data_dir: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        allow_http: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Filesystem {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Tilde-expanded data directory of the filesystem backend.
    pub fn data_dir(&self) -> WeekplanResult<PathBuf> {
        match self {
            StorageConfig::Filesystem { data_dir } => {
                let expanded = shellexpand::tilde(&data_dir.to_string_lossy()).into_owned();
                Ok(PathBuf::from(expanded))
            }
            StorageConfig::S3 { .. } => Err(WeekplanError::Config(
                "the s3 backend has no data directory".into(),
            )),
        }
    }

    pub fn is_filesystem(&self) -> bool {
        matches!(self, StorageConfig::Filesystem { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl ServerConfig {
    pub fn config_path() -> WeekplanResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WeekplanError::Config("Could not determine config directory".into()))?
            .join("weekplan");

        Ok(config_dir.join("server.toml"))
    }

    /// Load from the default config file and the environment.
    pub fn load() -> WeekplanResult<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path, true)
    }

    /// Load from `path` (optional on disk), plus the environment when
    /// `with_env` is set.
    pub fn load_from(path: &Path, with_env: bool) -> WeekplanResult<Self> {
        let mut builder = Config::builder().add_source(File::from(path).required(false));
        if with_env {
            builder = builder.add_source(
                Environment::with_prefix("WEEKPLAN")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        builder
            .build()
            .map_err(|e| WeekplanError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| WeekplanError::Config(e.to_string()))
    }

    pub fn socket_addr(&self) -> WeekplanResult<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| WeekplanError::Config(format!("Invalid bind address {}: {}", self.bind, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::load_from(&dir.path().join("server.toml"), false).unwrap();

        assert_eq!(config.port, 3001);
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3001");
        assert_eq!(config.storage, StorageConfig::default());
        assert!(!config.storage.data_dir().unwrap().starts_with("~"));
    }

    #[test]
    fn test_s3_backend_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
port = 8080

[storage]
backend = "s3"
bucket = "calendars"
endpoint = "http://localhost:9000"
allow_http = true
"#,
        )
        .unwrap();

        let config = ServerConfig::load_from(&path, false).unwrap();
        assert_eq!(config.port, 8080);
        match &config.storage {
            StorageConfig::S3 { bucket, region, endpoint, allow_http, .. } => {
                assert_eq!(bucket, "calendars");
                assert_eq!(region, "us-east-1");
                assert_eq!(endpoint.as_deref(), Some("http://localhost:9000"));
                assert!(*allow_http);
            }
            other => panic!("Expected s3 backend, got {:?}", other),
        }
        assert!(config.storage.data_dir().is_err());
    }

    #[test]
    fn test_filesystem_data_dir_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "[storage]\nbackend = \"filesystem\"\ndata_dir = \"/srv/weekplan\"\n").unwrap();

        let config = ServerConfig::load_from(&path, false).unwrap();
        assert_eq!(config.storage.data_dir().unwrap(), PathBuf::from("/srv/weekplan"));
    }
}
