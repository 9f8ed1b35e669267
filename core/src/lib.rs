//! Platform-agnostic core logic for the clock synchronization firmware
//!
//! This crate contains the SNTP session, the packet codec and the calendar
//! math shared by every board. It has NO hardware dependencies: boards plug
//! in through the traits of `clocksync-hal`.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible in every module
mod fmt;

pub mod config;
pub mod error;
pub mod sntp;
pub mod time;

pub use config::{SyncConfig, SNTP_PORT};
pub use error::{DecodeError, SyncError};
pub use sntp::{Event, SyncOutcome, SyncSession, SyncState};
pub use time::Timestamp;
