//! Error types for the SNTP client

/// Reasons a received datagram is not accepted as a time response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Sender address or port is not the queried server
    SourceMismatch,
    /// Payload is not exactly 48 bytes
    LengthMismatch,
    /// Mode field is not "server"
    InvalidMode,
    /// Stratum 0 (kiss-of-death / unsynchronized server)
    ZeroStratum,
    /// Datagram did not fit the bounded capture buffer
    AllocationFailure,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SourceMismatch => write!(f, "Unexpected source address or port"),
            Self::LengthMismatch => write!(f, "Unexpected packet length"),
            Self::InvalidMode => write!(f, "Not a server-mode packet"),
            Self::ZeroStratum => write!(f, "Stratum 0 (kiss-of-death)"),
            Self::AllocationFailure => write!(f, "Receive buffer exhausted"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// Why a synchronization cycle ended without a clock update
///
/// None of these are fatal: the session resets and retries on its own
/// cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError {
    /// Server hostname could not be resolved
    ResolutionFailure,
    /// Watchdog expired before a valid response arrived
    ResponseTimeout,
    /// The server answered with an unusable packet
    ResponseInvalid(DecodeError),
    /// A bounded buffer could not be obtained for the response
    AllocationFailure,
}

impl From<DecodeError> for SyncError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::AllocationFailure => SyncError::AllocationFailure,
            other => SyncError::ResponseInvalid(other),
        }
    }
}

impl core::fmt::Display for SyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ResolutionFailure => write!(f, "DNS resolution failed"),
            Self::ResponseTimeout => write!(f, "Request timeout"),
            Self::ResponseInvalid(e) => write!(f, "Invalid response: {}", e),
            Self::AllocationFailure => write!(f, "Buffer allocation failed"),
        }
    }
}

impl core::error::Error for SyncError {}
