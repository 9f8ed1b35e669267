//! Session collaborators for the Feather
//!
//! The session's commands are synchronous, while embassy-net's DNS and UDP
//! APIs are async. `NetPlatform` therefore records each command and the
//! driver carries it out on its next turn:
//!
//! - `resolve` parses numeric hostnames on the spot and otherwise queues a
//!   DNS query
//! - `send` queues one outgoing datagram
//! - `schedule_once` / `cancel` keep the single armed watchdog and its
//!   deadline on the RTIC monotonic
//! - `set_calendar_time` writes the RTC directly

use core::net::IpAddr;

use clocksync_hal::{
    CalendarTime, ClockSink, DatagramTransport, Duration, Instant, NameResolver, Resolution,
    TimerService,
};
use defmt::{debug, warn, Format};
use heapless::{String, Vec};
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::time::{RtcClock, RtcError};
use crate::Mono;

/// Deadline on the RTIC monotonic
pub type MonoInstant = <Mono as Monotonic>::Instant;

/// Longest hostname a DNS query is queued for
pub const MAX_HOSTNAME_LEN: usize = 64;

/// Largest datagram the driver sends
pub const MAX_OUTGOING_LEN: usize = 48;

/// Current monotonic time in the session's millisecond time base
pub fn now() -> Instant {
    Instant::from_ticks(Mono::now().duration_since_epoch().to_millis())
}

/// Identifies one armed watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub struct WatchdogHandle(u32);

/// Transport errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum SendError {
    /// A datagram is already waiting to go out
    Busy,
    /// Payload larger than [`MAX_OUTGOING_LEN`]
    TooLarge,
}

/// Datagram queued by the session
#[derive(Debug)]
pub struct Outgoing {
    pub dest: IpAddr,
    pub port: u16,
    pub payload: Vec<u8, MAX_OUTGOING_LEN>,
}

/// Armed watchdog
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    pub handle: WatchdogHandle,
    pub deadline: MonoInstant,
}

pub struct NetPlatform {
    lookup: Option<String<MAX_HOSTNAME_LEN>>,
    outgoing: Option<Outgoing>,
    watchdog: Option<Watchdog>,
    next_handle: u32,
    clock: RtcClock,
}

impl NetPlatform {
    pub fn new(clock: RtcClock) -> Self {
        Self {
            lookup: None,
            outgoing: None,
            watchdog: None,
            next_handle: 0,
            clock,
        }
    }

    /// DNS query requested by the session, if any
    pub fn take_lookup(&mut self) -> Option<String<MAX_HOSTNAME_LEN>> {
        self.lookup.take()
    }

    /// Datagram waiting to be sent, if any
    pub fn take_outgoing(&mut self) -> Option<Outgoing> {
        self.outgoing.take()
    }

    /// Currently armed watchdog
    pub fn watchdog(&self) -> Option<Watchdog> {
        self.watchdog
    }
}

impl NameResolver for NetPlatform {
    fn resolve(&mut self, hostname: &str) -> Resolution {
        if let Ok(address) = hostname.parse::<IpAddr>() {
            return Resolution::Cached(address);
        }

        match String::try_from(hostname) {
            Ok(name) => {
                self.lookup = Some(name);
                Resolution::Pending
            }
            Err(()) => {
                warn!("Hostname longer than {} bytes", MAX_HOSTNAME_LEN);
                Resolution::Failed
            }
        }
    }
}

impl DatagramTransport for NetPlatform {
    type Error = SendError;

    fn send(&mut self, dest: IpAddr, port: u16, payload: &[u8]) -> Result<(), SendError> {
        if self.outgoing.is_some() {
            return Err(SendError::Busy);
        }
        let payload = Vec::from_slice(payload).map_err(|()| SendError::TooLarge)?;
        self.outgoing = Some(Outgoing {
            dest,
            port,
            payload,
        });
        Ok(())
    }
}

impl TimerService for NetPlatform {
    type Handle = WatchdogHandle;

    fn schedule_once(&mut self, delay: Duration) -> WatchdogHandle {
        self.next_handle = self.next_handle.wrapping_add(1);
        let handle = WatchdogHandle(self.next_handle);
        let delay: <Mono as Monotonic>::Duration = delay.to_millis().millis();

        self.watchdog = Some(Watchdog {
            handle,
            deadline: Mono::now() + delay,
        });
        debug!("Watchdog {} armed for {} ms", handle, delay.to_millis());
        handle
    }

    fn cancel(&mut self, handle: WatchdogHandle) {
        if self.watchdog.is_some_and(|w| w.handle == handle) {
            self.watchdog = None;
        }
    }
}

impl ClockSink for NetPlatform {
    type Error = RtcError;

    fn set_calendar_time(&mut self, time: CalendarTime) -> Result<(), RtcError> {
        self.clock.set_calendar_time(time)
    }
}
