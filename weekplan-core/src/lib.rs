//! Core types for the weekplan ecosystem.
//!
//! This crate is shared by weekplan-server and weekplan-cli:
//! - `document` and `migrate` for the calendar JSON schema
//! - `schedule` for what is visible when, and every edit to a calendar
//! - `storage` and `sync` for persisting calendars with conflict detection
//! - `protocol` for the HTTP bodies exchanged between client and server

pub mod config;
pub mod date_range;
pub mod document;
pub mod error;
pub mod ids;
pub mod migrate;
pub mod protocol;
pub mod schedule;
pub mod storage;
pub mod sync;

pub use date_range::DateRange;
pub use document::*;
pub use error::{WeekplanError, WeekplanResult};
pub use migrate::migrate;
