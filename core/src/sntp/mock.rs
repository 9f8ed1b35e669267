//! Scripted platform for exercising the session on the host

use std::collections::VecDeque;
use std::net::IpAddr;

use clocksync_hal::{
    CalendarTime, ClockSink, DatagramTransport, Duration, NameResolver, Resolution, TimerService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentDatagram {
    pub dest: IpAddr,
    pub port: u16,
    pub payload: Vec<u8>,
}

/// Records every command the session issues
///
/// Cancelling an unknown handle, or one handle twice, panics.
#[derive(Debug, Default)]
pub(crate) struct MockPlatform {
    /// Answers handed out by `resolve`, front first; `Failed` once exhausted
    pub resolutions: VecDeque<Resolution>,
    pub lookups: Vec<String>,
    pub sent: Vec<SentDatagram>,
    pub fail_sends: bool,
    pub scheduled: Vec<(MockHandle, Duration)>,
    pub cancelled: Vec<MockHandle>,
    pub committed: Vec<CalendarTime>,
    pub fail_clock: bool,
}

impl MockPlatform {
    pub fn resolving_to(address: IpAddr) -> Self {
        let mut platform = Self::default();
        platform.script(Resolution::Cached(address));
        platform
    }

    pub fn script(&mut self, resolution: Resolution) {
        self.resolutions.push_back(resolution);
    }

    /// Most recently armed alarm
    pub fn last_handle(&self) -> MockHandle {
        self.scheduled.last().map(|(h, _)| *h).unwrap()
    }

    /// How often `handle` was cancelled
    pub fn cancel_count(&self, handle: MockHandle) -> usize {
        self.cancelled.iter().filter(|&&h| h == handle).count()
    }
}

impl NameResolver for MockPlatform {
    fn resolve(&mut self, hostname: &str) -> Resolution {
        self.lookups.push(hostname.into());
        self.resolutions.pop_front().unwrap_or(Resolution::Failed)
    }
}

impl DatagramTransport for MockPlatform {
    type Error = MockError;

    fn send(&mut self, dest: IpAddr, port: u16, payload: &[u8]) -> Result<(), MockError> {
        if self.fail_sends {
            return Err(MockError);
        }
        self.sent.push(SentDatagram {
            dest,
            port,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

impl TimerService for MockPlatform {
    type Handle = MockHandle;

    fn schedule_once(&mut self, delay: Duration) -> MockHandle {
        let handle = MockHandle(self.scheduled.len() as u32 + 1);
        self.scheduled.push((handle, delay));
        handle
    }

    fn cancel(&mut self, handle: MockHandle) {
        assert!(
            self.scheduled.iter().any(|(h, _)| *h == handle),
            "cancel of unknown alarm {:?}",
            handle
        );
        assert!(
            !self.cancelled.contains(&handle),
            "alarm {:?} cancelled twice",
            handle
        );
        self.cancelled.push(handle);
    }
}

impl ClockSink for MockPlatform {
    type Error = MockError;

    fn set_calendar_time(&mut self, time: CalendarTime) -> Result<(), MockError> {
        if self.fail_clock {
            return Err(MockError);
        }
        self.committed.push(time);
        Ok(())
    }
}
