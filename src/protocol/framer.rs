//! Packet framer over a [`StagedBuffer`].
//!
//! Decides whether one complete length-prefixed packet is buffered:
//! - `AwaitingLength`: the varint length prefix is not complete yet
//! - `AwaitingPacket`: length known, body not fully buffered
//! - `Ready`: the whole body is readable past the cursor
//!
//! On anything but `Ready` the cursor is rewound to the commit mark, so a
//! "not yet" answer never consumes data.

use super::staged_buffer::StagedBuffer;
use super::wire_format::ReadError;

/// Outcome of one framing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The length prefix itself is incomplete.
    AwaitingLength,
    /// The prefix decoded but fewer than `length` body bytes are buffered.
    AwaitingPacket {
        /// Declared body length.
        length: u32,
    },
    /// A complete packet is readable; the cursor sits at its first body byte.
    Ready(PacketBounds),
}

/// Location of a fully buffered packet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketBounds {
    /// Declared body length.
    pub length: u32,
    /// Cursor offset (relative to the commit mark) just past the body.
    pub end: usize,
}

impl PacketBounds {
    /// Bytes of this body the cursor has not passed yet.
    #[inline]
    pub fn remaining(&self, buffer: &StagedBuffer) -> usize {
        self.end.saturating_sub(buffer.consumed())
    }

    /// Whether the cursor has read past the declared end of the body.
    #[inline]
    pub fn overrun(&self, buffer: &StagedBuffer) -> bool {
        buffer.consumed() > self.end
    }
}

/// Try to frame the next packet at the cursor.
///
/// # Errors
///
/// Returns [`ReadError::Malformed`] if the length prefix is not a valid
/// varint. Insufficient data is reported through [`FrameStatus`], not as
/// an error.
pub fn next_packet(buffer: &mut StagedBuffer) -> Result<FrameStatus, ReadError> {
    let length = match buffer.read_varint() {
        Ok(length) => length,
        Err(ReadError::Insufficient) => {
            buffer.reset_read();
            return Ok(FrameStatus::AwaitingLength);
        }
        Err(e) => return Err(e),
    };

    if !buffer.can_read_bytes(length as usize) {
        buffer.reset_read();
        return Ok(FrameStatus::AwaitingPacket { length });
    }

    Ok(FrameStatus::Ready(PacketBounds {
        length,
        end: buffer.consumed() + length as usize,
    }))
}
