//! Client-local durable cache.
//!
//! Each calendar's collections are written to their own JSON file under
//! `<cache_dir>/<calendar id>/`, next to a `meta.json` with the schema
//! version and timestamps. The cache is only read when the server cannot
//! be reached; a successful fetch always replaces it.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tempfile::NamedTempFile;

use weekplan_core::CalendarDocument;
use weekplan_core::migrate::migrate;
use weekplan_core::schedule::ColorTable;

const META_FILE: &str = "meta.json";
const PREFERENCES_FILE: &str = "preferences.json";

/// Document collections cached one file each.
const COLLECTIONS: [&str; 6] = [
    "tasks",
    "projects",
    "meetings",
    "scheduledTasks",
    "completedTasks",
    "cancelledInstances",
];

fn default_true() -> bool {
    true
}

/// Per-user settings that never leave this machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_true")]
    pub chime_enabled: bool,
    #[serde(default)]
    pub colors: ColorTable,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            chime_enabled: true,
            colors: ColorTable::default(),
        }
    }
}

pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        LocalCache { dir: dir.into() }
    }

    fn calendar_dir(&self, calendar_id: &str) -> PathBuf {
        self.dir.join(calendar_id)
    }

    /// Replace the cached copy of a calendar.
    pub fn store(&self, calendar_id: &str, document: &CalendarDocument) -> Result<()> {
        let dir = self.calendar_dir(calendar_id);
        let value = serde_json::to_value(document)?;
        let Value::Object(mut fields) = value else {
            anyhow::bail!("Calendar did not serialize to an object");
        };

        for collection in COLLECTIONS {
            let items = fields.remove(collection).unwrap_or_else(|| json!([]));
            write_json(&dir, &format!("{}.json", collection), &items)?;
        }
        write_json(&dir, META_FILE, &Value::Object(fields))
    }

    /// The cached calendar, if one was ever stored.
    pub fn load(&self, calendar_id: &str) -> Result<Option<CalendarDocument>> {
        let dir = self.calendar_dir(calendar_id);
        let Some(meta) = read_json(&dir.join(META_FILE))? else {
            return Ok(None);
        };

        let mut fields = match meta {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        for collection in COLLECTIONS {
            if let Some(items) = read_json(&dir.join(format!("{}.json", collection)))? {
                fields.insert(collection.to_string(), items);
            }
        }

        Ok(Some(migrate(&Value::Object(fields))))
    }

    pub fn load_preferences(&self) -> Result<Preferences> {
        match read_json(&self.dir.join(PREFERENCES_FILE))? {
            Some(value) => Ok(serde_json::from_value(value).unwrap_or_default()),
            None => Ok(Preferences::default()),
        }
    }

    pub fn store_preferences(&self, preferences: &Preferences) -> Result<()> {
        write_json(&self.dir, PREFERENCES_FILE, &serde_json::to_value(preferences)?)
    }
}

fn read_json(path: &Path) -> Result<Option<Value>> {
    match fs::read(path) {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt cache file {}", path.display()))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Could not read {}", path.display())),
    }
}

/// Write through a temp file in the same directory, then rename over the
/// target.
fn write_json(dir: &Path, name: &str, value: &Value) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&serde_json::to_vec_pretty(value)?)?;
    file.persist(dir.join(name))
        .with_context(|| format!("Could not write {}", dir.join(name).display()))?;
    Ok(())
}
