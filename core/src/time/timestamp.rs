//! Unix timestamps with microsecond precision

use crate::sntp::packet::NtpTimestamp;

/// Timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    /// Unix timestamp in seconds since epoch (1970-01-01 00:00:00 UTC)
    pub unix_secs: u64,
    /// Microseconds component (0-999,999)
    pub micros: u32,
}

impl Timestamp {
    /// Create a new timestamp
    pub const fn new(unix_secs: u64, micros: u32) -> Self {
        Self { unix_secs, micros }
    }

    /// Convert from an NTP timestamp (seconds since 1900-01-01 plus fraction)
    pub fn from_ntp(ntp: NtpTimestamp) -> Self {
        Self::new(ntp.to_unix_secs() as u64, ntp.micros())
    }
}

impl From<NtpTimestamp> for Timestamp {
    fn from(ntp: NtpTimestamp) -> Self {
        Self::from_ntp(ntp)
    }
}
