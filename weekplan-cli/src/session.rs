//! One open calendar: the working copy, its local cache and its saver.
//!
//! Opening prefers the server copy and falls back to the cache (or a new
//! empty calendar) when the server can't be reached. Every edit lands in
//! the cache immediately and is handed to the [`AutoSaver`].

use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};

use weekplan_core::CalendarDocument;
use weekplan_core::WeekplanResult;
use weekplan_core::ids::validate_calendar_id;

use crate::autosave::{AutoSaveConfig, AutoSaver, Remote, SyncStatus};
use crate::cache::{LocalCache, Preferences};

/// Shown when a save lost to a newer server copy.
pub const SUPERSEDED_NOTICE: &str =
    "Your change was superseded by a newer version; the latest calendar has been loaded.";

/// Where the working copy came from when the session opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Server,
    /// The server was unreachable; the cached copy is in use.
    Cache,
    /// Unreachable and nothing cached; started from an empty calendar.
    Fresh,
}

pub struct Session {
    calendar_id: String,
    document: CalendarDocument,
    preferences: Preferences,
    origin: Origin,
    cache: LocalCache,
    saver: AutoSaver,
    notices: Vec<String>,
}

impl Session {
    pub async fn open(
        remote: Arc<dyn Remote>,
        cache: LocalCache,
        calendar_id: &str,
        config: AutoSaveConfig,
    ) -> Result<Self> {
        validate_calendar_id(calendar_id)?;
        let preferences = cache.load_preferences()?;

        let (document, origin) = match remote.fetch(calendar_id).await {
            Ok(document) => {
                cache.store(calendar_id, &document)?;
                (document, Origin::Server)
            }
            Err(e) => {
                warn!(calendar = calendar_id, error = %format!("{:#}", e), "Server unreachable");
                match cache.load(calendar_id)? {
                    Some(document) => (document, Origin::Cache),
                    None => (CalendarDocument::empty(Local::now().date_naive()), Origin::Fresh),
                }
            }
        };

        let saver = AutoSaver::spawn(
            remote,
            calendar_id.to_string(),
            document.last_modified,
            config,
        );

        Ok(Session {
            calendar_id: calendar_id.to_string(),
            document,
            preferences,
            origin,
            cache,
            saver,
            notices: Vec::new(),
        })
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    pub fn document(&self) -> &CalendarDocument {
        &self.document
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Apply one edit. On success the result is cached and queued for
    /// saving; a rejected edit leaves nothing to save.
    pub fn update<T>(
        &mut self,
        edit: impl FnOnce(&mut CalendarDocument, &mut Preferences) -> WeekplanResult<T>,
    ) -> Result<T> {
        let mut document = self.document.clone();
        let mut preferences = self.preferences.clone();
        let out = edit(&mut document, &mut preferences)?;

        if preferences != self.preferences {
            self.cache.store_preferences(&preferences)?;
            self.preferences = preferences;
        }
        if !document.payload_eq(&self.document) {
            self.cache.store(&self.calendar_id, &document)?;
            self.document = document;
            self.saver.changed(self.document.clone());
        }
        Ok(out)
    }

    /// Save anything pending now and wait for the outcome, including the
    /// single retry of a failed save.
    pub async fn sync(&mut self) -> Result<SyncStatus> {
        let flushed = self.saver.flush().await;
        let status = if flushed.is_settled() {
            flushed
        } else {
            self.saver.settle().await
        };
        self.apply(&status)?;
        Ok(status)
    }

    fn apply(&mut self, status: &SyncStatus) -> Result<()> {
        match status {
            SyncStatus::Saved {
                last_modified: Some(last_modified),
                ..
            } => {
                self.document.last_modified = Some(*last_modified);
                self.cache.store(&self.calendar_id, &self.document)?;
            }
            SyncStatus::Superseded { server_data, .. } => {
                info!(calendar = %self.calendar_id, "Loaded newer server copy");
                self.document = (**server_data).clone();
                self.cache.store(&self.calendar_id, &self.document)?;
                self.notices.push(SUPERSEDED_NOTICE.to_string());
            }
            _ => {}
        }
        Ok(())
    }

    /// Notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub async fn close(self) {
        self.saver.shutdown().await;
    }
}
