//! SNTP wire format (RFC 4330 / RFC 5905 header, 48 bytes)
//!
//! The packet is kept as the raw big-endian byte buffer it travels as; every
//! field is read and written through an accessor at its fixed offset, so there
//! is a single decoding path for each field.
//!
//! ```text
//!  0          1          2          3
//! +----------+----------+----------+----------+
//! |LI|VN|Mode| Stratum  |   Poll   | Precision|  0
//! |                Root Delay                 |  4
//! |             Root Dispersion               |  8
//! |               Reference ID                | 12
//! |       Reference Timestamp (64 bit)        | 16
//! |        Origin Timestamp (64 bit)          | 24
//! |        Receive Timestamp (64 bit)         | 32
//! |        Transmit Timestamp (64 bit)        | 40
//! +-------------------------------------------+
//! ```

use core::net::IpAddr;

use crate::config::SNTP_PORT;
use crate::error::DecodeError;

/// Size of an SNTP packet without extension fields
pub const NTP_PACKET_LEN: usize = 48;

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
pub const NTP_UNIX_OFFSET: u32 = 2_208_988_800;

/// LI=0 (no warning), VN=3, Mode=3 (client)
const CLIENT_REQUEST_HEADER: u8 = 0x1B;

const OFFSET_LI_VN_MODE: usize = 0;
const OFFSET_STRATUM: usize = 1;
const OFFSET_POLL: usize = 2;
const OFFSET_PRECISION: usize = 3;
const OFFSET_ROOT_DELAY: usize = 4;
const OFFSET_ROOT_DISPERSION: usize = 8;
const OFFSET_REFERENCE_ID: usize = 12;
const OFFSET_REFERENCE_TS: usize = 16;
const OFFSET_ORIGIN_TS: usize = 24;
const OFFSET_RECEIVE_TS: usize = 32;
const OFFSET_TRANSMIT_TS: usize = 40;

/// Association mode (low three bits of the first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// 0
    Reserved = 0,
    /// 1
    SymmetricActive = 1,
    /// 2
    SymmetricPassive = 2,
    /// 3
    Client = 3,
    /// 4
    Server = 4,
    /// 5
    Broadcast = 5,
    /// 6
    Control = 6,
    /// 7
    Private = 7,
}

impl Mode {
    /// Decode the low three bits of `bits`
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Reserved,
            1 => Self::SymmetricActive,
            2 => Self::SymmetricPassive,
            3 => Self::Client,
            4 => Self::Server,
            5 => Self::Broadcast,
            6 => Self::Control,
            _ => Self::Private,
        }
    }
}

/// 64-bit NTP timestamp: seconds since 1900-01-01 and a binary fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NtpTimestamp {
    /// Whole seconds since the NTP epoch (modulo 2^32)
    pub seconds: u32,
    /// Fraction of a second in units of 2^-32 s
    pub fraction: u32,
}

impl NtpTimestamp {
    /// Create a timestamp from its raw fields
    pub const fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    /// Build an NTP timestamp from Unix seconds and microseconds
    pub fn from_unix(unix_secs: u32, micros: u32) -> Self {
        let fraction = ((micros.min(999_999) as u64) << 32) / 1_000_000;
        Self::new(unix_secs.wrapping_add(NTP_UNIX_OFFSET), fraction as u32)
    }

    /// Seconds since the Unix epoch
    ///
    /// The subtraction wraps, so a server in NTP era 1 (after 2036-02-07)
    /// still maps to the right Unix time up to 2106.
    pub const fn to_unix_secs(&self) -> u32 {
        self.seconds.wrapping_sub(NTP_UNIX_OFFSET)
    }

    /// Fractional part converted to microseconds (0-999,999)
    pub const fn micros(&self) -> u32 {
        ((self.fraction as u64 * 1_000_000) >> 32) as u32
    }

    fn read(bytes: &[u8; NTP_PACKET_LEN], offset: usize) -> Self {
        Self::new(
            read_u32(bytes, offset),
            read_u32(bytes, offset + 4),
        )
    }

    fn write(&self, bytes: &mut [u8; NTP_PACKET_LEN], offset: usize) {
        bytes[offset..offset + 4].copy_from_slice(&self.seconds.to_be_bytes());
        bytes[offset + 4..offset + 8].copy_from_slice(&self.fraction.to_be_bytes());
    }
}

fn read_u32(bytes: &[u8; NTP_PACKET_LEN], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// One SNTP packet as it appears on the wire
#[derive(Clone, PartialEq, Eq)]
pub struct NtpPacket {
    bytes: [u8; NTP_PACKET_LEN],
}

impl NtpPacket {
    /// All-zero packet
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; NTP_PACKET_LEN],
        }
    }

    /// Minimal client request: everything zero except LI/VN/Mode
    pub const fn client_request() -> Self {
        let mut bytes = [0; NTP_PACKET_LEN];
        bytes[OFFSET_LI_VN_MODE] = CLIENT_REQUEST_HEADER;
        Self { bytes }
    }

    /// Copy a received payload, which must be exactly one packet long
    pub fn from_bytes(payload: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; NTP_PACKET_LEN] = payload
            .try_into()
            .map_err(|_| DecodeError::LengthMismatch)?;
        Ok(Self { bytes })
    }

    /// Raw wire bytes
    pub const fn as_bytes(&self) -> &[u8; NTP_PACKET_LEN] {
        &self.bytes
    }

    /// Consume the packet, returning its wire bytes
    pub const fn into_bytes(self) -> [u8; NTP_PACKET_LEN] {
        self.bytes
    }

    /// Leap indicator (0-3)
    pub const fn leap_indicator(&self) -> u8 {
        (self.bytes[OFFSET_LI_VN_MODE] & 0xC0) >> 6
    }

    /// Protocol version number (0-7)
    pub const fn version(&self) -> u8 {
        (self.bytes[OFFSET_LI_VN_MODE] & 0x38) >> 3
    }

    /// Association mode
    pub const fn mode(&self) -> Mode {
        Mode::from_bits(self.bytes[OFFSET_LI_VN_MODE])
    }

    /// Set leap indicator, version and mode in one go
    pub fn set_li_vn_mode(&mut self, leap_indicator: u8, version: u8, mode: Mode) {
        self.bytes[OFFSET_LI_VN_MODE] =
            ((leap_indicator & 0x03) << 6) | ((version & 0x07) << 3) | (mode as u8);
    }

    /// Server stratum (0 = kiss-of-death, 1 = primary, 2-15 = secondary)
    pub const fn stratum(&self) -> u8 {
        self.bytes[OFFSET_STRATUM]
    }

    /// Set the stratum byte
    pub fn set_stratum(&mut self, stratum: u8) {
        self.bytes[OFFSET_STRATUM] = stratum;
    }

    /// Poll interval exponent (log2 seconds)
    pub const fn poll(&self) -> u8 {
        self.bytes[OFFSET_POLL]
    }

    /// Clock precision exponent (log2 seconds, signed)
    pub const fn precision(&self) -> i8 {
        self.bytes[OFFSET_PRECISION] as i8
    }

    /// Root delay, 16.16 fixed point seconds
    pub fn root_delay(&self) -> u32 {
        read_u32(&self.bytes, OFFSET_ROOT_DELAY)
    }

    /// Root dispersion, 16.16 fixed point seconds
    pub fn root_dispersion(&self) -> u32 {
        read_u32(&self.bytes, OFFSET_ROOT_DISPERSION)
    }

    /// Reference identifier
    pub fn reference_id(&self) -> [u8; 4] {
        let mut id = [0; 4];
        id.copy_from_slice(&self.bytes[OFFSET_REFERENCE_ID..OFFSET_REFERENCE_ID + 4]);
        id
    }

    /// Set the reference identifier
    pub fn set_reference_id(&mut self, id: [u8; 4]) {
        self.bytes[OFFSET_REFERENCE_ID..OFFSET_REFERENCE_ID + 4].copy_from_slice(&id);
    }

    /// ASCII kiss code carried in the reference ID of a stratum 0 packet
    pub fn kiss_code(&self) -> Option<[u8; 4]> {
        (self.stratum() == 0).then(|| self.reference_id())
    }

    /// Time the server clock was last set
    pub fn reference_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::read(&self.bytes, OFFSET_REFERENCE_TS)
    }

    /// Client transmit time echoed back by the server
    pub fn origin_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::read(&self.bytes, OFFSET_ORIGIN_TS)
    }

    /// Set the origin timestamp
    pub fn set_origin_timestamp(&mut self, ts: NtpTimestamp) {
        ts.write(&mut self.bytes, OFFSET_ORIGIN_TS);
    }

    /// Time the request arrived at the server
    pub fn receive_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::read(&self.bytes, OFFSET_RECEIVE_TS)
    }

    /// Set the receive timestamp
    pub fn set_receive_timestamp(&mut self, ts: NtpTimestamp) {
        ts.write(&mut self.bytes, OFFSET_RECEIVE_TS);
    }

    /// Time the response left the server
    pub fn transmit_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::read(&self.bytes, OFFSET_TRANSMIT_TS)
    }

    /// Set the transmit timestamp
    pub fn set_transmit_timestamp(&mut self, ts: NtpTimestamp) {
        ts.write(&mut self.bytes, OFFSET_TRANSMIT_TS);
    }
}

impl Default for NtpPacket {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl core::fmt::Debug for NtpPacket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NtpPacket")
            .field("leap_indicator", &self.leap_indicator())
            .field("version", &self.version())
            .field("mode", &self.mode())
            .field("stratum", &self.stratum())
            .field("poll", &self.poll())
            .field("precision", &self.precision())
            .field("reference_id", &self.reference_id())
            .field("transmit", &self.transmit_timestamp())
            .finish()
    }
}

/// Encode the client request sent for every synchronization attempt
pub fn encode_request() -> [u8; NTP_PACKET_LEN] {
    NtpPacket::client_request().into_bytes()
}

/// Validate a datagram as the response to our request
///
/// Checks, in order: source address and port 123, exact length, server mode,
/// non-zero stratum.
pub fn validate_response(
    bytes: &[u8],
    sender_address: IpAddr,
    sender_port: u16,
    expected_address: IpAddr,
) -> Result<NtpPacket, DecodeError> {
    validate_response_from(
        bytes,
        sender_address,
        sender_port,
        expected_address,
        SNTP_PORT,
    )
}

/// [`validate_response`] against a server listening on a non-standard port
pub fn validate_response_from(
    bytes: &[u8],
    sender_address: IpAddr,
    sender_port: u16,
    expected_address: IpAddr,
    expected_port: u16,
) -> Result<NtpPacket, DecodeError> {
    if sender_address != expected_address || sender_port != expected_port {
        return Err(DecodeError::SourceMismatch);
    }

    let packet = NtpPacket::from_bytes(bytes)?;

    if packet.mode() != Mode::Server {
        return Err(DecodeError::InvalidMode);
    }
    if packet.stratum() == 0 {
        return Err(DecodeError::ZeroStratum);
    }

    Ok(packet)
}

/// Validate a response and return the server's transmit time in Unix seconds
pub fn decode_response(
    bytes: &[u8],
    sender_address: IpAddr,
    sender_port: u16,
    expected_address: IpAddr,
) -> Result<u32, DecodeError> {
    validate_response(bytes, sender_address, sender_port, expected_address)
        .map(|packet| packet.transmit_timestamp().to_unix_secs())
}
