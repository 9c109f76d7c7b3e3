//! HTTP protocol types.
//!
//! Defines the JSON bodies exchanged between weekplan clients and
//! weekplan-server. A fetched calendar is the bare
//! [`CalendarDocument`](crate::document::CalendarDocument).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::CalendarDocument;
use crate::sync::SaveOutcome;

/// Body field carrying the client's concurrency token on save.
pub const CLIENT_LAST_MODIFIED: &str = "clientLastModified";

pub const CONFLICT_ERROR: &str = "Conflict detected";

/// Reply to an accepted save (changed or not).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub has_changes: bool,
    pub message: String,
}

/// Reply to a save rejected as stale (HTTP 409).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResponse {
    pub error: String,
    pub message: String,
    pub server_data: CalendarDocument,
    pub server_last_modified: DateTime<Utc>,
}

/// Either reply to a save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveReply {
    Accepted(SaveResponse),
    Conflict(Box<ConflictResponse>),
}

impl From<SaveOutcome> for SaveReply {
    fn from(outcome: SaveOutcome) -> Self {
        let message = outcome.message().to_string();
        match outcome {
            SaveOutcome::Saved { last_modified } => SaveReply::Accepted(SaveResponse {
                success: true,
                last_modified: Some(last_modified),
                has_changes: true,
                message,
            }),
            SaveOutcome::Unchanged { last_modified } => SaveReply::Accepted(SaveResponse {
                success: true,
                last_modified,
                has_changes: false,
                message,
            }),
            SaveOutcome::Conflict {
                server_data,
                server_last_modified,
            } => SaveReply::Conflict(Box::new(ConflictResponse {
                error: CONFLICT_ERROR.to_string(),
                message,
                server_data: *server_data,
                server_last_modified,
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarList {
    pub calendars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
