//! Time synchronization event loop
//!
//! Runs one attempt as soon as the network is up, then calls `maybe_sync`
//! on every tick of the poll interval. Between ticks it waits on whichever
//! completion the session can use next: the pending DNS query, a datagram
//! on the client socket or the watchdog deadline.

use core::convert::Infallible;

use clocksync_core::sntp::{Datagram, Event, SyncOutcome, SyncSession};
use clocksync_core::SyncConfig;
use defmt::{debug, error, info, warn, Debug2Format};
use embassy_futures::select::{select, select3, Either, Either3};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::Ticker;
use rtic_monotonics::Monotonic;

use super::platform::{self, NetPlatform, Watchdog, WatchdogHandle};
use crate::time::RtcClock;
use crate::Mono;

/// Receive buffer; larger than what the session captures so oversized
/// answers still reach it
const RECV_BUFFER_LEN: usize = 128;

/// Run the session forever on `stack`
pub async fn run(stack: Stack<'static>, config: SyncConfig, clock: RtcClock) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; 4 * RECV_BUFFER_LEN];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_buffer = [0u8; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    if let Err(e) = socket.bind(0) {
        error!("Failed to bind SNTP socket: {}", Debug2Format(&e));
        let never: Infallible = core::future::pending().await;
        match never {}
    }

    info!(
        "SNTP client for {} (poll every {} s)",
        config.server,
        config.poll_interval.to_secs()
    );
    let mut ticker = Ticker::every(embassy_time::Duration::from_millis(
        config.poll_interval.to_millis(),
    ));
    let mut session = SyncSession::new(config, platform::now());
    let mut platform = NetPlatform::new(clock);

    let outcome = session.maybe_sync(platform::now(), &mut platform);
    report(&session, outcome);

    loop {
        if let Some(outgoing) = platform.take_outgoing() {
            let endpoint = IpEndpoint::new(outgoing.dest.into(), outgoing.port);
            if let Err(e) = socket.send_to(&outgoing.payload, endpoint).await {
                // The watchdog ends the attempt
                warn!("Failed to send to {}: {}", Debug2Format(&endpoint), Debug2Format(&e));
            }
        }

        let event = if let Some(hostname) = platform.take_lookup() {
            let lookup = stack.dns_query(hostname.as_str(), DnsQueryType::A);
            let answered = select(lookup, watchdog_expiry(platform.watchdog())).await;
            match answered {
                Either::First(Ok(addresses)) => match addresses.first() {
                    Some(&address) => Event::Resolved(address.into()),
                    None => Event::ResolveFailed,
                },
                Either::First(Err(e)) => {
                    warn!("DNS query for {} failed: {}", hostname.as_str(), Debug2Format(&e));
                    Event::ResolveFailed
                }
                Either::Second(handle) => Event::WatchdogFired(handle),
            }
        } else {
            let mut buf = [0u8; RECV_BUFFER_LEN];
            let woken = select3(
                socket.recv_from(&mut buf),
                watchdog_expiry(platform.watchdog()),
                ticker.next(),
            )
            .await;
            match woken {
                Either3::First(Ok((len, meta))) => {
                    debug!("Received {} bytes from {}", len, Debug2Format(&meta.endpoint));
                    Event::PacketReceived(Datagram::new(
                        meta.endpoint.addr.into(),
                        meta.endpoint.port,
                        &buf[..len],
                    ))
                }
                Either3::First(Err(e)) => {
                    // Datagrams over RECV_BUFFER_LEN end up here as truncated
                    warn!("UDP receive failed: {}", Debug2Format(&e));
                    continue;
                }
                Either3::Second(handle) => Event::WatchdogFired(handle),
                Either3::Third(()) => {
                    let outcome = session.maybe_sync(platform::now(), &mut platform);
                    report(&session, outcome);
                    continue;
                }
            }
        };

        let outcome = session.handle_event(platform::now(), event, &mut platform);
        report(&session, outcome);
    }
}

/// Resolves when `watchdog` expires; never resolves when none is armed
async fn watchdog_expiry(watchdog: Option<Watchdog>) -> WatchdogHandle {
    match watchdog {
        Some(Watchdog { handle, deadline }) => {
            Mono::delay_until(deadline).await;
            handle
        }
        None => {
            let never: Infallible = core::future::pending().await;
            match never {}
        }
    }
}

fn report(session: &SyncSession<WatchdogHandle>, outcome: Option<SyncOutcome>) {
    let Some(outcome) = outcome else {
        return;
    };

    match outcome {
        SyncOutcome::Synchronized(ts) => info!(
            "SNTP sync successful: {}.{:06} UTC",
            ts.unix_secs, ts.micros
        ),
        SyncOutcome::Failed(e) => warn!("SNTP sync failed: {}", e),
    }

    let stats = session.stats();
    debug!(
        "SNTP attempts: {}, successes: {}, next due at {} ms",
        stats.attempts,
        stats.successes,
        session.next_attempt_due_at().ticks()
    );
}
