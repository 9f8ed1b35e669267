//! Wall-clock time on the board
//!
//! The SNTP session commits server time into the internal RTC (clocked by the
//! 32.768 kHz LSE), which keeps counting between synchronizations.
//!
//! ## defmt Timestamps
//!
//! Log lines carry the RTC time as Unix seconds with the `:iso8601s` hint,
//! e.g. `1717587900` → `2024-06-05T11:45:00Z`. Before the first
//! synchronization the timestamp is 0.

mod rtc;

pub use rtc::{initialize_rtc, is_time_synced, read_unix_secs, RtcClock, RtcError};

defmt::timestamp!("{=u64:iso8601s}", read_unix_secs().unwrap_or(0));
