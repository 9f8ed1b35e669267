//! SNTP synchronization session
//!
//! A [`SyncSession`] runs one attempt at a time:
//!
//! ```text
//!            maybe_sync (due)            address known
//!   Idle ─────────────────────► Resolving ─────────────► AwaitingResponse
//!    ▲                              │                           │
//!    │      resolve failed /        │       valid response /    │
//!    └──── watchdog expired ◄───────┴────── invalid response / ─┘
//!                                           watchdog expired
//! ```
//!
//! Every attempt arms one watchdog covering both resolution and the response
//! wait. However the attempt ends, the watchdog is cancelled exactly once,
//! the session returns to `Idle` and the next attempt becomes due
//! `min_retry_interval` after completion.
//!
//! The session never blocks and never touches hardware. Commands go out
//! through the platform traits; completions come back through
//! [`SyncSession::handle_event`].

use core::fmt::Debug;
use core::net::IpAddr;

use clocksync_hal::{
    ClockSink, DatagramTransport, Instant, NameResolver, Resolution, TimerService,
};

use crate::config::SyncConfig;
use crate::error::{DecodeError, SyncError};
use crate::fmt::Debug2Format;
use crate::sntp::event::{Datagram, Event};
use crate::sntp::packet::{encode_request, validate_response_from, NtpPacket, NtpTimestamp};
use crate::time::{unix_to_calendar, Timestamp};

/// Everything a session needs from its platform
///
/// Implemented for any type providing all four collaborators.
pub trait SyncPlatform: NameResolver + DatagramTransport + TimerService + ClockSink {}

impl<T> SyncPlatform for T where T: NameResolver + DatagramTransport + TimerService + ClockSink {}

/// Phase of the current attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncState {
    /// No attempt in flight
    Idle,
    /// Waiting for the server hostname to resolve
    Resolving,
    /// Request sent, waiting for the server's answer
    AwaitingResponse,
}

/// How a finished attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncOutcome {
    /// The server's transmit time was committed to the clock sink
    Synchronized(Timestamp),
    /// The attempt failed; the next one is scheduled normally
    Failed(SyncError),
}

/// Running counters over the session lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncStats {
    /// Attempts started
    pub attempts: u32,
    /// Attempts that produced a time
    pub successes: u32,
    /// Hostname could not be resolved
    pub resolution_failures: u32,
    /// Watchdog expired before a valid answer arrived
    pub timeouts: u32,
    /// Answers from the server that failed validation
    pub invalid_responses: u32,
    /// Answers too large for the capture buffer
    pub allocation_failures: u32,
    /// Datagrams from other sources, ignored
    pub stray_datagrams: u32,
    /// Times the clock sink rejected a synchronized time
    pub clock_errors: u32,
}

impl SyncStats {
    fn record_failure(&mut self, error: SyncError) {
        match error {
            SyncError::ResolutionFailure => self.resolution_failures += 1,
            SyncError::ResponseTimeout => self.timeouts += 1,
            SyncError::ResponseInvalid(_) => self.invalid_responses += 1,
            SyncError::AllocationFailure => self.allocation_failures += 1,
        }
    }
}

/// SNTP client state machine
///
/// `H` is the platform's [`TimerService::Handle`].
#[derive(Debug)]
pub struct SyncSession<H> {
    config: SyncConfig,
    state: SyncState,
    /// Address of the server for the attempt in flight (or the last one)
    server_address: Option<IpAddr>,
    next_attempt_due_at: Instant,
    /// Alarm armed for the attempt in flight
    watchdog: Option<H>,
    last_sync: Option<Timestamp>,
    stats: SyncStats,
}

impl<H> SyncSession<H>
where
    H: Copy + Eq + Debug,
{
    /// Create an idle session whose first attempt is due at `now`
    pub fn new(config: SyncConfig, now: Instant) -> Self {
        Self {
            config,
            state: SyncState::Idle,
            server_address: None,
            next_attempt_due_at: now,
            watchdog: None,
            last_sync: None,
            stats: SyncStats::default(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Whether an attempt is in flight (resolving or awaiting the response)
    pub fn is_request_in_flight(&self) -> bool {
        self.state != SyncState::Idle
    }

    /// Earliest instant at which `maybe_sync` starts a new attempt
    pub fn next_attempt_due_at(&self) -> Instant {
        self.next_attempt_due_at
    }

    /// Whether `maybe_sync(now)` would start an attempt
    pub fn is_due(&self, now: Instant) -> bool {
        !self.is_request_in_flight() && now >= self.next_attempt_due_at
    }

    pub fn server_address(&self) -> Option<IpAddr> {
        self.server_address
    }

    /// Handle of the watchdog guarding the attempt in flight
    pub fn watchdog(&self) -> Option<H> {
        self.watchdog
    }

    /// Time obtained by the most recent successful attempt
    pub fn last_sync(&self) -> Option<Timestamp> {
        self.last_sync
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Start an attempt if none is in flight and one is due
    ///
    /// Returns the outcome only when the attempt finishes synchronously, which
    /// happens when the resolver fails immediately. Otherwise the attempt
    /// finishes through [`handle_event`](Self::handle_event).
    pub fn maybe_sync<P>(&mut self, now: Instant, platform: &mut P) -> Option<SyncOutcome>
    where
        P: SyncPlatform<Handle = H>,
    {
        if self.is_request_in_flight() {
            trace!("SNTP request already in flight");
            return None;
        }
        if now < self.next_attempt_due_at {
            trace!(
                "SNTP attempt not due for {} ms",
                (self.next_attempt_due_at - now).to_millis()
            );
            return None;
        }

        self.stats.attempts += 1;
        info!("Starting SNTP synchronization with {}", self.config.server);

        self.watchdog = Some(platform.schedule_once(self.config.resend_timeout));
        self.state = SyncState::Resolving;

        match platform.resolve(self.config.server) {
            Resolution::Cached(address) => {
                self.send_request(address, platform);
                None
            }
            Resolution::Pending => {
                debug!("Waiting for DNS answer for {}", self.config.server);
                None
            }
            Resolution::Failed => {
                warn!("Failed to resolve {}", self.config.server);
                Some(self.finish(now, Err(SyncError::ResolutionFailure), platform))
            }
        }
    }

    /// Feed a completion from the platform into the session
    ///
    /// Events that do not belong to the current phase (a late DNS answer, a
    /// datagram while idle, an expired watchdog from an earlier attempt) are
    /// ignored. Returns the outcome when the event finishes the attempt.
    pub fn handle_event<P>(
        &mut self,
        now: Instant,
        event: Event<H>,
        platform: &mut P,
    ) -> Option<SyncOutcome>
    where
        P: SyncPlatform<Handle = H>,
    {
        match (self.state, event) {
            (SyncState::Resolving, Event::Resolved(address)) => {
                self.send_request(address, platform);
                None
            }
            (SyncState::Resolving, Event::ResolveFailed) => {
                warn!("Failed to resolve {}", self.config.server);
                Some(self.finish(now, Err(SyncError::ResolutionFailure), platform))
            }
            (SyncState::AwaitingResponse, Event::PacketReceived(datagram)) => {
                self.on_datagram(now, &datagram, platform)
            }
            (SyncState::Resolving | SyncState::AwaitingResponse, Event::WatchdogFired(handle))
                if self.watchdog == Some(handle) =>
            {
                warn!("No SNTP response within {} ms", self.config.resend_timeout.to_millis());
                Some(self.finish(now, Err(SyncError::ResponseTimeout), platform))
            }
            (state, event) => {
                debug!("Ignoring {} event in state {}", event.name(), state);
                None
            }
        }
    }

    fn send_request<P>(&mut self, address: IpAddr, platform: &mut P)
    where
        P: SyncPlatform<Handle = H>,
    {
        debug!(
            "Resolved {} to {}",
            self.config.server,
            Debug2Format(&address)
        );
        self.server_address = Some(address);
        self.state = SyncState::AwaitingResponse;

        let request = encode_request();
        match platform.send(address, self.config.port, &request) {
            Ok(()) => debug!("SNTP request sent to port {}", self.config.port),
            // The watchdog still ends the attempt
            Err(e) => warn!("Failed to send SNTP request: {}", Debug2Format(&e)),
        }
    }

    fn on_datagram<P>(
        &mut self,
        now: Instant,
        datagram: &Datagram,
        platform: &mut P,
    ) -> Option<SyncOutcome>
    where
        P: SyncPlatform<Handle = H>,
    {
        let expected = self.server_address?;

        if !datagram.is_from(expected, self.config.port) {
            self.stats.stray_datagrams += 1;
            warn!(
                "Ignoring datagram from {}:{}",
                Debug2Format(&datagram.source()),
                datagram.port()
            );
            return None;
        }

        let result = datagram.payload().and_then(|payload| {
            validate_response_from(
                payload,
                datagram.source(),
                datagram.port(),
                expected,
                self.config.port,
            )
        });

        match result {
            Ok(packet) => {
                debug!(
                    "SNTP response: stratum {}, precision {}",
                    packet.stratum(),
                    packet.precision()
                );
                Some(self.finish(now, Ok(packet.transmit_timestamp()), platform))
            }
            Err(e) => {
                warn!("Invalid SNTP response: {}", e);
                if e == DecodeError::ZeroStratum {
                    log_kiss_code(datagram);
                }
                Some(self.finish(now, Err(e.into()), platform))
            }
        }
    }

    /// Conclude the attempt in flight
    fn finish<P>(
        &mut self,
        now: Instant,
        result: Result<NtpTimestamp, SyncError>,
        platform: &mut P,
    ) -> SyncOutcome
    where
        P: SyncPlatform<Handle = H>,
    {
        // Cancelling an alarm that already expired is a no-op for the platform
        if let Some(handle) = self.watchdog.take() {
            platform.cancel(handle);
        }
        self.state = SyncState::Idle;
        self.next_attempt_due_at = now + self.config.min_retry_interval;

        match result {
            Ok(transmit) => {
                let timestamp = Timestamp::from_ntp(transmit);
                let time = unix_to_calendar(timestamp.unix_secs);
                info!(
                    "Time synchronized: {}-{}-{} {}:{}:{} UTC",
                    time.year,
                    time.month,
                    time.day,
                    time.hour,
                    time.minute,
                    time.second
                );

                if let Err(e) = platform.set_calendar_time(time) {
                    self.stats.clock_errors += 1;
                    error!("Failed to set clock: {}", Debug2Format(&e));
                }

                self.stats.successes += 1;
                self.last_sync = Some(timestamp);
                SyncOutcome::Synchronized(timestamp)
            }
            Err(e) => {
                self.stats.record_failure(e);
                SyncOutcome::Failed(e)
            }
        }
    }
}

fn log_kiss_code(datagram: &Datagram) {
    let code = datagram
        .payload()
        .ok()
        .and_then(|payload| NtpPacket::from_bytes(payload).ok())
        .and_then(|packet| packet.kiss_code());

    if let Some(code) = code {
        warn!("Kiss-o'-Death from server: {=[u8]:a}", &code[..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sntp::mock::{MockHandle, MockPlatform};
    use crate::sntp::packet::{Mode, NTP_PACKET_LEN, NTP_UNIX_OFFSET};
    use clocksync_hal::{Duration, Weekday};
    use core::net::Ipv4Addr;

    const SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(162, 159, 200, 1));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 66));

    /// 2024-06-05 11:45:00 UTC
    const SERVER_TIME: u32 = 1_717_587_900;

    fn t(millis: u64) -> Instant {
        Instant::from_ticks(millis)
    }

    fn session() -> SyncSession<MockHandle> {
        SyncSession::new(SyncConfig::default(), t(0))
    }

    fn response(stratum: u8, unix_secs: u32) -> [u8; NTP_PACKET_LEN] {
        let mut packet = NtpPacket::from_bytes(&encode_request()).unwrap();
        packet.set_li_vn_mode(0, 4, Mode::Server);
        packet.set_stratum(stratum);
        packet.set_transmit_timestamp(NtpTimestamp::new(unix_secs.wrapping_add(NTP_UNIX_OFFSET), 0));
        packet.into_bytes()
    }

    fn from_server(payload: &[u8]) -> Event<MockHandle> {
        Event::PacketReceived(Datagram::new(SERVER, 123, payload))
    }

    #[test]
    fn test_happy_path() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();

        assert_eq!(session.maybe_sync(t(0), &mut platform), None);
        assert_eq!(session.state(), SyncState::AwaitingResponse);
        assert_eq!(platform.lookups, ["pool.ntp.org"]);
        assert_eq!(platform.scheduled, [(MockHandle(1), Duration::secs(10))]);
        assert_eq!(platform.sent.len(), 1);
        assert_eq!(platform.sent[0].dest, SERVER);
        assert_eq!(platform.sent[0].port, 123);
        assert_eq!(platform.sent[0].payload, encode_request());

        let outcome = session.handle_event(t(250), from_server(&response(2, SERVER_TIME)), &mut platform);
        assert_eq!(
            outcome,
            Some(SyncOutcome::Synchronized(Timestamp::new(SERVER_TIME as u64, 0)))
        );

        assert_eq!(platform.committed.len(), 1);
        let time = platform.committed[0];
        assert_eq!((time.year, time.month, time.day), (2024, 6, 5));
        assert_eq!((time.hour, time.minute, time.second), (11, 45, 0));
        assert_eq!(time.weekday, Weekday::Wednesday);

        assert_eq!(platform.cancelled, [MockHandle(1)]);
        assert_eq!(session.state(), SyncState::Idle);
        assert_eq!(session.watchdog(), None);
        assert_eq!(session.next_attempt_due_at(), t(250) + Duration::secs(30));
        assert_eq!(session.last_sync(), Some(Timestamp::new(SERVER_TIME as u64, 0)));
        assert_eq!(session.stats().successes, 1);
    }

    #[test]
    fn test_response_timeout() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        let handle = platform.last_handle();

        let outcome = session.handle_event(t(10_000), Event::WatchdogFired(handle), &mut platform);
        assert_eq!(outcome, Some(SyncOutcome::Failed(SyncError::ResponseTimeout)));
        assert!(platform.committed.is_empty());
        assert_eq!(platform.cancel_count(handle), 1);
        assert_eq!(session.state(), SyncState::Idle);
        assert_eq!(session.next_attempt_due_at(), t(40_000));
        assert_eq!(session.stats().timeouts, 1);

        // A duplicate expiry changes nothing
        assert_eq!(
            session.handle_event(t(10_001), Event::WatchdogFired(handle), &mut platform),
            None
        );
        assert_eq!(platform.cancel_count(handle), 1);
    }

    #[test]
    fn test_stray_datagram_is_ignored() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();
        session.maybe_sync(t(0), &mut platform);

        let forged = response(1, 0);
        let outcome = session.handle_event(
            t(100),
            Event::PacketReceived(Datagram::new(OTHER, 123, &forged)),
            &mut platform,
        );
        assert_eq!(outcome, None);

        let outcome = session.handle_event(
            t(200),
            Event::PacketReceived(Datagram::new(SERVER, 40_000, &forged)),
            &mut platform,
        );
        assert_eq!(outcome, None);

        assert_eq!(session.state(), SyncState::AwaitingResponse);
        assert!(platform.committed.is_empty());
        assert!(platform.cancelled.is_empty());
        assert_eq!(session.stats().stray_datagrams, 2);

        // Nothing genuine arrives: the watchdog ends the attempt
        let handle = platform.last_handle();
        let outcome = session.handle_event(t(10_000), Event::WatchdogFired(handle), &mut platform);
        assert_eq!(outcome, Some(SyncOutcome::Failed(SyncError::ResponseTimeout)));
        assert!(platform.committed.is_empty());
    }

    #[test]
    fn test_genuine_response_after_stray() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();
        session.maybe_sync(t(0), &mut platform);

        session.handle_event(
            t(100),
            Event::PacketReceived(Datagram::new(OTHER, 123, &response(1, 0))),
            &mut platform,
        );
        let outcome = session.handle_event(t(300), from_server(&response(2, SERVER_TIME)), &mut platform);

        assert!(matches!(outcome, Some(SyncOutcome::Synchronized(_))));
        assert_eq!(platform.committed, [unix_to_calendar(SERVER_TIME as u64)]);
    }

    #[test]
    fn test_single_request_in_flight() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        assert!(session.is_request_in_flight());

        assert_eq!(session.maybe_sync(t(1), &mut platform), None);
        assert_eq!(session.maybe_sync(t(3_600_000), &mut platform), None);

        assert_eq!(platform.lookups.len(), 1);
        assert_eq!(platform.sent.len(), 1);
        assert_eq!(platform.scheduled.len(), 1);
        assert_eq!(session.stats().attempts, 1);
    }

    #[test]
    fn test_retry_interval_floor() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        platform.script(Resolution::Cached(SERVER));
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        session.handle_event(t(500), from_server(&response(2, SERVER_TIME)), &mut platform);

        assert!(!session.is_due(t(30_499)));
        assert_eq!(session.maybe_sync(t(30_499), &mut platform), None);
        assert_eq!(platform.lookups.len(), 1);

        assert!(session.is_due(t(30_500)));
        session.maybe_sync(t(30_500), &mut platform);
        assert_eq!(platform.lookups.len(), 2);
        assert_eq!(session.state(), SyncState::AwaitingResponse);
    }

    #[test]
    fn test_first_attempt_due_immediately() {
        let session = SyncSession::<MockHandle>::new(SyncConfig::default(), t(5_000));
        assert_eq!(session.next_attempt_due_at(), t(5_000));
        assert!(session.is_due(t(5_000)));
        assert!(!session.is_due(t(4_999)));
    }

    #[test]
    fn test_pending_resolution() {
        let mut platform = MockPlatform::default();
        platform.script(Resolution::Pending);
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        assert_eq!(session.state(), SyncState::Resolving);
        assert!(platform.sent.is_empty());
        // The watchdog already covers resolution
        assert_eq!(platform.scheduled.len(), 1);

        assert_eq!(
            session.handle_event(t(40), Event::Resolved(SERVER), &mut platform),
            None
        );
        assert_eq!(session.state(), SyncState::AwaitingResponse);
        assert_eq!(session.server_address(), Some(SERVER));
        assert_eq!(platform.sent.len(), 1);
        assert_eq!(platform.sent[0].dest, SERVER);

        let outcome = session.handle_event(t(90), from_server(&response(3, SERVER_TIME)), &mut platform);
        assert!(matches!(outcome, Some(SyncOutcome::Synchronized(_))));
        assert_eq!(platform.cancelled, [MockHandle(1)]);
    }

    #[test]
    fn test_immediate_resolution_failure() {
        let mut platform = MockPlatform::default();
        platform.script(Resolution::Failed);
        let mut session = session();

        let outcome = session.maybe_sync(t(0), &mut platform);
        assert_eq!(outcome, Some(SyncOutcome::Failed(SyncError::ResolutionFailure)));
        assert!(platform.sent.is_empty());
        assert_eq!(platform.cancelled, [MockHandle(1)]);
        assert_eq!(session.state(), SyncState::Idle);
        assert_eq!(session.next_attempt_due_at(), t(30_000));
        assert_eq!(session.stats().resolution_failures, 1);
    }

    #[test]
    fn test_async_resolution_failure() {
        let mut platform = MockPlatform::default();
        platform.script(Resolution::Pending);
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        let outcome = session.handle_event(t(2_000), Event::ResolveFailed, &mut platform);

        assert_eq!(outcome, Some(SyncOutcome::Failed(SyncError::ResolutionFailure)));
        assert!(platform.sent.is_empty());
        assert_eq!(platform.cancelled, [MockHandle(1)]);
        assert_eq!(session.next_attempt_due_at(), t(32_000));
    }

    #[test]
    fn test_resolution_timeout() {
        let mut platform = MockPlatform::default();
        platform.script(Resolution::Pending);
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        let outcome = session.handle_event(t(10_000), Event::WatchdogFired(MockHandle(1)), &mut platform);
        assert_eq!(outcome, Some(SyncOutcome::Failed(SyncError::ResponseTimeout)));

        // The DNS answer shows up after the attempt was abandoned
        assert_eq!(
            session.handle_event(t(10_500), Event::Resolved(SERVER), &mut platform),
            None
        );
        assert!(platform.sent.is_empty());
        assert_eq!(session.state(), SyncState::Idle);
    }

    #[test]
    fn test_invalid_response_ends_attempt() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();
        session.maybe_sync(t(0), &mut platform);

        let outcome = session.handle_event(t(100), from_server(&response(0, SERVER_TIME)), &mut platform);
        assert_eq!(
            outcome,
            Some(SyncOutcome::Failed(SyncError::ResponseInvalid(DecodeError::ZeroStratum)))
        );
        assert!(platform.committed.is_empty());
        assert_eq!(platform.cancelled, [MockHandle(1)]);
        assert_eq!(session.stats().invalid_responses, 1);
    }

    #[test]
    fn test_wrong_mode_and_length() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        platform.script(Resolution::Cached(SERVER));
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        let mut client_echo = response(2, SERVER_TIME);
        client_echo[0] = 0x23;
        assert_eq!(
            session.handle_event(t(100), from_server(&client_echo), &mut platform),
            Some(SyncOutcome::Failed(SyncError::ResponseInvalid(DecodeError::InvalidMode)))
        );

        session.maybe_sync(t(30_100), &mut platform);
        assert_eq!(
            session.handle_event(t(30_200), from_server(&response(2, SERVER_TIME)[..47]), &mut platform),
            Some(SyncOutcome::Failed(SyncError::ResponseInvalid(DecodeError::LengthMismatch)))
        );
        assert_eq!(platform.cancelled, [MockHandle(1), MockHandle(2)]);
    }

    #[test]
    fn test_oversized_response() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();
        session.maybe_sync(t(0), &mut platform);

        let outcome = session.handle_event(t(100), from_server(&[0x24; 100]), &mut platform);
        assert_eq!(outcome, Some(SyncOutcome::Failed(SyncError::AllocationFailure)));
        assert_eq!(session.stats().allocation_failures, 1);
        assert_eq!(platform.cancelled, [MockHandle(1)]);
    }

    #[test]
    fn test_oversized_stray_is_ignored() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        let mut session = session();
        session.maybe_sync(t(0), &mut platform);

        let outcome = session.handle_event(
            t(100),
            Event::PacketReceived(Datagram::new(OTHER, 123, &[0; 100])),
            &mut platform,
        );
        assert_eq!(outcome, None);
        assert_eq!(session.state(), SyncState::AwaitingResponse);
    }

    #[test]
    fn test_stale_watchdog_is_ignored() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        platform.script(Resolution::Cached(SERVER));
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        session.handle_event(t(100), from_server(&response(2, SERVER_TIME)), &mut platform);

        session.maybe_sync(t(30_100), &mut platform);
        assert_eq!(session.watchdog(), Some(MockHandle(2)));

        // Expiry of the first attempt's alarm raced with its cancellation
        assert_eq!(
            session.handle_event(t(30_200), Event::WatchdogFired(MockHandle(1)), &mut platform),
            None
        );
        assert_eq!(session.state(), SyncState::AwaitingResponse);
        assert_eq!(platform.cancelled, [MockHandle(1)]);
    }

    #[test]
    fn test_datagram_while_idle_is_ignored() {
        let mut platform = MockPlatform::default();
        let mut session = session();

        assert_eq!(
            session.handle_event(t(0), from_server(&response(2, SERVER_TIME)), &mut platform),
            None
        );
        assert!(platform.committed.is_empty());
        assert_eq!(session.stats(), &SyncStats::default());
    }

    #[test]
    fn test_clock_error_still_synchronizes() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        platform.fail_clock = true;
        let mut session = session();

        session.maybe_sync(t(0), &mut platform);
        let outcome = session.handle_event(t(100), from_server(&response(2, SERVER_TIME)), &mut platform);

        assert!(matches!(outcome, Some(SyncOutcome::Synchronized(_))));
        assert_eq!(session.stats().clock_errors, 1);
        assert_eq!(session.next_attempt_due_at(), t(30_100));
        assert_eq!(platform.cancelled, [MockHandle(1)]);
    }

    #[test]
    fn test_send_failure_waits_for_watchdog() {
        let mut platform = MockPlatform::resolving_to(SERVER);
        platform.fail_sends = true;
        let mut session = session();

        assert_eq!(session.maybe_sync(t(0), &mut platform), None);
        assert_eq!(session.state(), SyncState::AwaitingResponse);

        let outcome = session.handle_event(t(10_000), Event::WatchdogFired(MockHandle(1)), &mut platform);
        assert_eq!(outcome, Some(SyncOutcome::Failed(SyncError::ResponseTimeout)));
    }

    #[test]
    fn test_custom_server_and_port() {
        let config = SyncConfig {
            port: 1123,
            ..SyncConfig::with_server("10.0.0.1")
        };
        let server = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let mut platform = MockPlatform::resolving_to(server);
        let mut session = SyncSession::new(config, t(0));

        session.maybe_sync(t(0), &mut platform);
        assert_eq!(platform.lookups, ["10.0.0.1"]);
        assert_eq!(platform.sent[0].port, 1123);

        // Port 123 is not where this server answers from
        let body = response(2, SERVER_TIME);
        session.handle_event(t(10), Event::PacketReceived(Datagram::new(server, 123, &body)), &mut platform);
        assert_eq!(session.stats().stray_datagrams, 1);

        let outcome = session.handle_event(
            t(20),
            Event::PacketReceived(Datagram::new(server, 1123, &body)),
            &mut platform,
        );
        assert!(matches!(outcome, Some(SyncOutcome::Synchronized(_))));
    }

    #[test]
    fn test_every_conclusion_cancels_once() {
        let mut platform = MockPlatform::default();
        platform.script(Resolution::Failed);
        platform.script(Resolution::Cached(SERVER));
        platform.script(Resolution::Cached(SERVER));
        platform.script(Resolution::Cached(SERVER));
        let mut session = session();
        let mut now = 0;

        // resolution failure
        session.maybe_sync(t(now), &mut platform);
        now += 30_000;
        // timeout
        session.maybe_sync(t(now), &mut platform);
        now += 10_000;
        session.handle_event(t(now), Event::WatchdogFired(platform.last_handle()), &mut platform);
        now += 30_000;
        // invalid response
        session.maybe_sync(t(now), &mut platform);
        session.handle_event(t(now), from_server(&response(0, 0)), &mut platform);
        now += 30_000;
        // success
        session.maybe_sync(t(now), &mut platform);
        session.handle_event(t(now), from_server(&response(2, SERVER_TIME)), &mut platform);

        assert_eq!(platform.scheduled.len(), 4);
        for (handle, _) in &platform.scheduled {
            assert_eq!(platform.cancel_count(*handle), 1);
        }
        let stats = session.stats();
        assert_eq!(stats.attempts, 4);
        assert_eq!(
            (stats.resolution_failures, stats.timeouts, stats.invalid_responses, stats.successes),
            (1, 1, 1, 1)
        );
    }
}
