//! Name resolution and datagram transport

use core::net::IpAddr;

/// Immediate answer of a [`NameResolver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The address was known already (cache hit or numeric hostname)
    Cached(IpAddr),
    /// A lookup was started; its completion is delivered later
    Pending,
    /// The lookup could not be started or failed immediately
    Failed,
}

/// Hostname to address resolution
pub trait NameResolver {
    /// Start resolving `hostname`
    ///
    /// Returns [`Resolution::Pending`] when the answer arrives asynchronously.
    /// The platform then reports exactly one completion for this request.
    fn resolve(&mut self, hostname: &str) -> Resolution;
}

/// Unreliable datagram (UDP) transport
///
/// Incoming datagrams are not pulled through this trait: the platform's
/// receive path hands them to the session together with their source.
pub trait DatagramTransport {
    /// Transport error type
    type Error: core::fmt::Debug;

    /// Queue `payload` for transmission to `dest:port`
    fn send(&mut self, dest: IpAddr, port: u16, payload: &[u8]) -> Result<(), Self::Error>;
}
