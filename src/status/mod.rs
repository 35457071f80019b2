//! Status log: record codec, the log itself, and timestamp helpers.

pub mod record;
pub mod status_log;
pub mod time;

pub use record::is_valid_step_id;
pub use status_log::StatusLog;
pub use time::{format_timestamp, now_millis, parse_timestamp};
