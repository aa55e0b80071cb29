//! Wire format primitives.
//!
//! Every packet on the wire is length-prefixed:
//! ```text
//! ┌──────────────┬───────────────┬─────────────────────┐
//! │ Length       │ Packet ID     │ Payload             │
//! │ varint       │ varint        │ Length - |ID| bytes │
//! └──────────────┴───────────────┴─────────────────────┘
//! ```
//!
//! Varints carry 7 payload bits per byte, least significant group first,
//! with the high bit set on every byte except the last. Fixed-width integers
//! are Big Endian.

use bytes::BufMut;
use thiserror::Error;

/// Maximum encoded size of a 32-bit varint.
pub const MAX_VARINT_LEN: usize = 5;

/// Packet id of the initial handshake.
pub const HANDSHAKE_PACKET_ID: u32 = 0x00;

/// Status request (legacy path), no body.
pub const STATUS_REQUEST_ID: u32 = 0x00;

/// Ping request (legacy path), 8-byte timestamp body.
pub const PING_REQUEST_ID: u32 = 0x01;

/// Status response, JSON body.
pub const STATUS_RESPONSE_ID: u32 = 0x00;

/// Ping response, echoes the request timestamp.
pub const PING_RESPONSE_ID: u32 = 0x01;

/// Disconnect notice sent before any version handler exists.
pub const DISCONNECT_PACKET_ID: u32 = 0x00;

/// Declared length of a status request (id only).
pub const STATUS_REQUEST_LENGTH: u32 = 1;

/// Declared length of a ping request (id + i64).
pub const PING_REQUEST_LENGTH: u32 = 9;

/// Upper bound on a length-prefixed string, in bytes.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 32767;

/// Default staging capacity for a connection's handshake bytes.
pub const DEFAULT_MAX_HANDSHAKE_BYTES: usize = 8 * 1024;

/// Why a decode could not produce a value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// Not enough bytes buffered yet. Retry once more data arrives.
    #[error("insufficient data")]
    Insufficient,
    /// The bytes can never decode to a valid value.
    #[error("malformed data: {0}")]
    Malformed(&'static str),
}

/// Client intent declared in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Server list status query ("ping").
    Status,
    /// Proceed to login.
    Login,
    /// Any other value; kept so handlers can decide.
    Other(u32),
}

impl Intent {
    /// Wire value of the status intent.
    pub const STATUS: u32 = 1;
    /// Wire value of the login intent.
    pub const LOGIN: u32 = 2;

    /// Interpret a raw next-state value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            Self::STATUS => Intent::Status,
            Self::LOGIN => Intent::Login,
            other => Intent::Other(other),
        }
    }

    /// Raw next-state value.
    pub fn as_raw(self) -> u32 {
        match self {
            Intent::Status => Self::STATUS,
            Intent::Login => Self::LOGIN,
            Intent::Other(raw) => raw,
        }
    }
}

/// Decode a varint from the front of `buf`.
///
/// Returns the value and the number of bytes it occupied.
///
/// # Example
///
/// ```
/// use mc_handshake::protocol::decode_varint;
///
/// assert_eq!(decode_varint(&[0xac, 0x02]), Ok((300, 2)));
/// ```
pub fn decode_varint(buf: &[u8]) -> Result<(u32, usize), ReadError> {
    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        Err(ReadError::Malformed("varint longer than 5 bytes"))
    } else {
        Err(ReadError::Insufficient)
    }
}

/// Number of bytes `value` occupies as a varint.
#[inline]
pub fn varint_size(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0x0fff_ffff => 4,
        _ => 5,
    }
}

/// Append `value` as a varint.
pub fn put_varint<B: BufMut>(buf: &mut B, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

/// Append a varint-length-prefixed UTF-8 string.
pub fn put_string<B: BufMut>(buf: &mut B, value: &str) {
    put_varint(buf, value.len() as u32);
    buf.put_slice(value.as_bytes());
}
