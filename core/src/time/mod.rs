//! Wall-clock time representations
//!
//! - [`calendar`]: Unix seconds ⇄ broken-down UTC calendar time
//! - [`timestamp`]: Unix seconds with a microsecond component

pub mod calendar;
pub mod timestamp;

pub use calendar::{calendar_to_unix, is_leap_year, unix_to_calendar};
pub use timestamp::Timestamp;
