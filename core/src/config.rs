//! Time synchronization configuration

use clocksync_hal::Duration;

/// Well-known SNTP server port (UDP 123)
pub const SNTP_PORT: u16 = 123;

/// SNTP client configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hostname (or numeric address) of the time server
    pub server: &'static str,
    /// UDP port the server answers from
    pub port: u16,
    /// Watchdog armed for each attempt, covering resolution and response
    pub resend_timeout: Duration,
    /// Dwell time after any attempt before the next one becomes due
    pub min_retry_interval: Duration,
    /// Cadence at which the periodic driver calls `maybe_sync`
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server: "pool.ntp.org",
            port: SNTP_PORT,
            resend_timeout: Duration::secs(10),
            min_retry_interval: Duration::secs(30),
            poll_interval: Duration::hours(1),
        }
    }
}

impl SyncConfig {
    /// Default configuration against a different server
    pub fn with_server(server: &'static str) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }
}
