//! SNTP client
//!
//! - [`packet`]: 48-byte wire format, request encoding and response validation
//! - [`event`]: completions the platform feeds back into the session
//! - [`session`]: the synchronization state machine

pub mod event;
pub mod packet;
pub mod session;

#[cfg(test)]
mod mock;

pub use event::{Datagram, Event, DATAGRAM_CAPACITY};
pub use packet::{decode_response, encode_request, validate_response, NtpPacket, NtpTimestamp};
pub use session::{SyncOutcome, SyncPlatform, SyncSession, SyncState, SyncStats};
