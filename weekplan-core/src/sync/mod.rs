//! Server side of the optimistic-concurrency sync protocol.
//!
//! A client saves its whole document along with the `lastModified` token it
//! last saw. The save is rejected if the stored copy has moved on, skipped
//! if nothing changed, and otherwise written with a fresh token.

mod locks;
mod outcome;
mod service;

pub use locks::CalendarLocks;
pub use outcome::{CONFLICT_MESSAGE, SAVED_MESSAGE, SaveOutcome, SaveRequest, UNCHANGED_MESSAGE};
pub use service::{CREATE_ATTEMPTS, CalendarService};
