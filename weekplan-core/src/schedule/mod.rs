//! The scheduling model: visibility, layout and state transitions over a
//! [`CalendarDocument`](crate::document::CalendarDocument).

pub mod colors;
pub mod layout;
pub mod meetings;
pub mod projects;
pub mod status;
pub mod tasks;
pub mod visible;

pub use colors::{ColorTable, PALETTE};
pub use layout::{Interval, Placement, layout_day};
pub use meetings::{MeetingEdit, MeetingPlacement, NewMeeting};
pub use projects::{NewProject, ProjectEdit};
pub use status::{NowAndNext, format_duration, format_start_time};
pub use tasks::{MIN_DURATION_MINUTES, NewTask, TaskEdit};
pub use visible::{DayItem, MeetingOccurrence, cancellation_key};
