//! Error types for the weekplan ecosystem.

use thiserror::Error;

/// Errors that can occur in weekplan operations.
#[derive(Error, Debug)]
pub enum WeekplanError {
    /// The stored document (or object) does not exist. Callers at the
    /// fetch boundary treat this as an empty calendar, not a fault.
    #[error("Calendar not found: {0}")]
    NotFound(String),

    #[error("Invalid calendar ID: {0:?}")]
    InvalidCalendarId(String),

    #[error("Failed to generate a unique calendar ID after {0} attempts")]
    IdExhausted(usize),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown scheduled occurrence: {0}")]
    UnknownOccurrence(String),

    #[error("Unknown meeting: {0}")]
    UnknownMeeting(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WeekplanError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WeekplanError::NotFound(_))
    }
}

impl From<serde_json::Error> for WeekplanError {
    fn from(err: serde_json::Error) -> Self {
        WeekplanError::Serialization(err.to_string())
    }
}

/// Result type alias for weekplan operations.
pub type WeekplanResult<T> = Result<T, WeekplanError>;
