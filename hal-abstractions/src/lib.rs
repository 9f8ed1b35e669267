//! Hardware abstraction traits for the clock synchronization firmware
//!
//! This crate defines the collaborators the SNTP session talks to. BSPs
//! implement these traits on top of their network stack, timer queue and RTC
//! peripheral; host tests implement them with recording mocks.
//!
//! All trait methods are synchronous. Work that completes later (a DNS query
//! in progress, a datagram arriving, a watchdog expiring) is reported back to
//! the session as an event by the platform's event loop.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod net;
pub mod rtc;
pub mod timer;

pub use net::{DatagramTransport, NameResolver, Resolution};
pub use rtc::{CalendarTime, ClockSink, Weekday};
pub use timer::{Duration, Instant, TimerService};
