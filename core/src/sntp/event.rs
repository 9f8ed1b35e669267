//! Asynchronous completions fed back into the session

use core::net::IpAddr;

use heapless::Vec;

use crate::error::DecodeError;

/// Largest datagram payload captured for decoding
pub const DATAGRAM_CAPACITY: usize = 64;

/// A received datagram together with its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    source: IpAddr,
    port: u16,
    /// `None` when the payload did not fit the capture buffer
    payload: Option<Vec<u8, DATAGRAM_CAPACITY>>,
}

impl Datagram {
    /// Capture `payload` received from `source:port`
    ///
    /// Payloads longer than [`DATAGRAM_CAPACITY`] are not stored; decoding
    /// such a datagram reports [`DecodeError::AllocationFailure`].
    pub fn new(source: IpAddr, port: u16, payload: &[u8]) -> Self {
        Self {
            source,
            port,
            payload: Vec::from_slice(payload).ok(),
        }
    }

    /// Sender address
    pub fn source(&self) -> IpAddr {
        self.source
    }

    /// Sender port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the datagram came from `address:port`
    pub fn is_from(&self, address: IpAddr, port: u16) -> bool {
        self.source == address && self.port == port
    }

    /// Captured payload bytes
    pub fn payload(&self) -> Result<&[u8], DecodeError> {
        self.payload
            .as_deref()
            .ok_or(DecodeError::AllocationFailure)
    }
}

/// Completion delivered to [`SyncSession::handle_event`]
///
/// `H` is the timer service's alarm handle type.
///
/// [`SyncSession::handle_event`]: super::session::SyncSession::handle_event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<H> {
    /// A pending name lookup produced an address
    Resolved(IpAddr),
    /// A pending name lookup failed
    ResolveFailed,
    /// A datagram arrived on the client socket
    PacketReceived(Datagram),
    /// The alarm identified by the handle expired
    WatchdogFired(H),
}

impl<H> Event<H> {
    /// Short name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resolved(_) => "Resolved",
            Self::ResolveFailed => "ResolveFailed",
            Self::PacketReceived(_) => "PacketReceived",
            Self::WatchdogFired(_) => "WatchdogFired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::net::Ipv4Addr;

    const SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(162, 159, 200, 1));

    #[test]
    fn test_datagram_capture() {
        let d = Datagram::new(SERVER, 123, &[0x24; 48]);
        assert!(d.is_from(SERVER, 123));
        assert!(!d.is_from(SERVER, 124));
        assert_eq!(d.payload().map(|p| p.len()), Ok(48));
    }

    #[test]
    fn test_oversized_datagram() {
        let d = Datagram::new(SERVER, 123, &[0; DATAGRAM_CAPACITY + 1]);
        assert_eq!(d.payload(), Err(DecodeError::AllocationFailure));

        let d = Datagram::new(SERVER, 123, &[0; DATAGRAM_CAPACITY]);
        assert!(d.payload().is_ok());
    }
}
