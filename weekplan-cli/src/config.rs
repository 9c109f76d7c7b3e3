//! CLI configuration at ~/.config/weekplan/config.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::autosave::AutoSaveConfig;

static DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3001";
static DEFAULT_DEBOUNCE: &str = "2s";
static DEFAULT_RETRY_DELAY: &str = "5s";

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_debounce() -> String {
    DEFAULT_DEBOUNCE.to_string()
}

fn default_retry_delay() -> String {
    DEFAULT_RETRY_DELAY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_calendar: Option<String>,

    /// Quiet period before an edit is saved, e.g. "2s".
    #[serde(default = "default_debounce")]
    pub debounce: String,

    /// Delay before retrying a failed save, e.g. "5s".
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            server_url: default_server_url(),
            default_calendar: None,
            debounce: default_debounce(),
            retry_delay: default_retry_delay(),
            cache_dir: None,
        }
    }
}

impl CliConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("weekplan");

        Ok(config_dir.join("config.toml"))
    }

    /// Load ~/.config/weekplan/config.toml, with `WEEKPLAN_CLI_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("WEEKPLAN_CLI"))
            .build()
            .context("Could not read config")?
            .try_deserialize()
            .context("Invalid config")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Could not serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    pub fn autosave(&self) -> Result<AutoSaveConfig> {
        Ok(AutoSaveConfig {
            debounce: parse_duration("debounce", &self.debounce)?,
            retry_delay: parse_duration("retry_delay", &self.retry_delay)?,
        })
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .context("Could not determine data directory")?
                .join("weekplan")
                .join("cache")),
        }
    }

    /// The calendar to use: the explicit one, else the configured default.
    pub fn calendar(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.default_calendar.clone())
            .context(
                "No calendar selected.\n\n\
                Create one with:\n  \
                weekplan new\n\n\
                or pass --calendar <id>",
            )
    }

    /// Set the default calendar if one isn't already configured.
    /// Returns true if the default was set.
    pub fn set_default_calendar_if_unset(&mut self, calendar_id: &str) -> bool {
        if self.default_calendar.is_some() {
            return false;
        }
        self.default_calendar = Some(calendar_id.to_string());
        true
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).with_context(|| format!("Invalid {} {:?}", field, value))
}
