use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::document::CalendarDocument;
use crate::migrate::migrate;
use crate::protocol::CLIENT_LAST_MODIFIED;

pub const CONFLICT_MESSAGE: &str = "Calendar has been modified by another client";
pub const SAVED_MESSAGE: &str = "Calendar updated";
pub const UNCHANGED_MESSAGE: &str = "No changes detected";

/// A client's save: its whole document plus the token it last saw.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub document: CalendarDocument,
    pub client_last_modified: Option<DateTime<Utc>>,
}

impl SaveRequest {
    pub fn new(document: CalendarDocument, client_last_modified: Option<DateTime<Utc>>) -> Self {
        SaveRequest {
            document,
            client_last_modified,
        }
    }

    /// Split a save body into the document and the client's token.
    ///
    /// The document is migrated, so older clients may still post relative
    /// coordinates. A token that does not parse as RFC 3339 counts as
    /// absent.
    pub fn from_body(mut body: Value) -> Self {
        let client_last_modified = body
            .as_object_mut()
            .and_then(|obj| obj.remove(CLIENT_LAST_MODIFIED))
            .and_then(|v| v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
            .map(|dt| dt.with_timezone(&Utc));

        SaveRequest {
            document: migrate(&body),
            client_last_modified,
        }
    }
}

/// Result of a save: exactly one of saved, no-op, or rejected as stale.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved {
        last_modified: DateTime<Utc>,
    },
    /// Nothing changed; the stored token was left alone.
    Unchanged {
        last_modified: Option<DateTime<Utc>>,
    },
    /// The stored document is newer than the client's token.
    Conflict {
        server_data: Box<CalendarDocument>,
        server_last_modified: DateTime<Utc>,
    },
}

impl SaveOutcome {
    pub fn has_changes(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SaveOutcome::Conflict { .. })
    }

    pub fn message(&self) -> &'static str {
        match self {
            SaveOutcome::Saved { .. } => SAVED_MESSAGE,
            SaveOutcome::Unchanged { .. } => UNCHANGED_MESSAGE,
            SaveOutcome::Conflict { .. } => CONFLICT_MESSAGE,
        }
    }

    /// The token the client should hold after this save.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self {
            SaveOutcome::Saved { last_modified } => Some(*last_modified),
            SaveOutcome::Unchanged { last_modified } => *last_modified,
            SaveOutcome::Conflict {
                server_last_modified,
                ..
            } => Some(*server_last_modified),
        }
    }
}
