//! Staged byte buffer with speculative reads.
//!
//! Uses `bytes::BytesMut` for storage. Reads advance a cursor tentatively;
//! the caller then either commits (bytes are gone for good) or resets
//! (cursor rewinds to the last commit mark) when a parse ran out of data.
//!
//! ```text
//!  commit mark        read cursor               write position    capacity
//!      │ provisionally read │  readable, not yet read  │   free      │
//!      ▼────────────────────▼──────────────────────────▼─────────────▼
//! ```
//!
//! Committed bytes are dropped from the front of the storage, so offsets
//! reported by this type are always relative to the commit mark.
//!
//! # Example
//!
//! ```
//! use mc_handshake::protocol::{ReadError, StagedBuffer};
//!
//! let mut buffer = StagedBuffer::new(64);
//! buffer.write(&[0xac]).unwrap();
//! assert_eq!(buffer.read_varint(), Err(ReadError::Insufficient));
//!
//! buffer.write(&[0x02]).unwrap();
//! assert_eq!(buffer.read_varint(), Ok(300));
//! buffer.commit();
//! assert!(buffer.is_empty());
//! ```

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::wire_format::{decode_varint, ReadError};

/// A write would push the buffer past its capacity.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("buffer full: {used} of {capacity} bytes used, {attempted} more offered")]
pub struct BufferFull {
    /// Bytes between the commit mark and the write position.
    pub used: usize,
    /// Configured capacity.
    pub capacity: usize,
    /// Size of the rejected write.
    pub attempted: usize,
}

/// Growable byte buffer with a read cursor and a commit mark.
///
/// Invariant: commit mark <= read cursor <= write position <= capacity.
pub struct StagedBuffer {
    /// Bytes from the commit mark up to the write position.
    data: BytesMut,
    /// Read cursor, relative to the commit mark.
    read_pos: usize,
    /// Maximum number of uncommitted bytes.
    capacity: usize,
}

impl StagedBuffer {
    /// Create an empty buffer that holds at most `capacity` uncommitted bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity.min(4096)),
            read_pos: 0,
            capacity,
        }
    }

    /// Append bytes at the write position.
    ///
    /// # Errors
    ///
    /// Returns [`BufferFull`] and leaves the buffer untouched if the bytes
    /// would not fit.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BufferFull> {
        if self.data.len() + bytes.len() > self.capacity {
            return Err(BufferFull {
                used: self.data.len(),
                capacity: self.capacity,
                attempted: bytes.len(),
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Configured capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes between the commit mark and the write position.
    #[inline]
    pub fn used(&self) -> usize {
        self.data.len()
    }

    /// Bytes between the read cursor and the write position.
    #[inline]
    pub fn readable(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Bytes provisionally read since the last commit.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.read_pos
    }

    /// Check if nothing is buffered past the commit mark.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether at least `n` bytes are available past the cursor.
    #[inline]
    pub fn can_read_bytes(&self, n: usize) -> bool {
        self.readable() >= n
    }

    /// Readable bytes, without consuming them.
    #[inline]
    pub fn peek(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    /// Make every provisional read permanent.
    pub fn commit(&mut self) {
        let _ = self.data.split_to(self.read_pos);
        self.read_pos = 0;
    }

    /// Undo every read since the last commit.
    #[inline]
    pub fn reset_read(&mut self) {
        self.read_pos = 0;
    }

    /// Advance the cursor past `n` bytes without interpreting them.
    pub fn skip(&mut self, n: usize) -> Result<(), ReadError> {
        self.need(n)?;
        self.read_pos += n;
        Ok(())
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        self.need(1)?;
        let value = self.data[self.read_pos];
        self.read_pos += 1;
        Ok(value)
    }

    /// Read a Big Endian `u16`.
    pub fn read_u16_be(&mut self) -> Result<u16, ReadError> {
        let bytes = self.read_array::<2>()?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read a Big Endian `i64`.
    pub fn read_i64_be(&mut self) -> Result<i64, ReadError> {
        let bytes = self.read_array::<8>()?;
        Ok(i64::from_be_bytes(bytes))
    }

    /// Read a varint.
    pub fn read_varint(&mut self) -> Result<u32, ReadError> {
        let (value, len) = decode_varint(self.peek())?;
        self.read_pos += len;
        Ok(value)
    }

    /// Read a varint-length-prefixed UTF-8 string of at most `max_len` bytes.
    ///
    /// On any failure the cursor is left where it was before the length.
    pub fn read_utf8(&mut self, max_len: usize) -> Result<String, ReadError> {
        let start = self.read_pos;
        let result = self.read_utf8_inner(max_len);
        if result.is_err() {
            self.read_pos = start;
        }
        result
    }

    fn read_utf8_inner(&mut self, max_len: usize) -> Result<String, ReadError> {
        let len = self.read_varint()? as usize;
        if len > max_len {
            return Err(ReadError::Malformed("string length exceeds limit"));
        }
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ReadError::Malformed("invalid UTF-8"))
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes, ReadError> {
        self.need(n)?;
        let bytes = Bytes::copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(bytes)
    }

    /// Drop everything, including uncommitted bytes.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        self.need(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.read_pos..self.read_pos + N]);
        self.read_pos += N;
        Ok(out)
    }

    #[inline]
    fn need(&self, n: usize) -> Result<(), ReadError> {
        if self.can_read_bytes(n) {
            Ok(())
        } else {
            Err(ReadError::Insufficient)
        }
    }
}

impl std::fmt::Debug for StagedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedBuffer")
            .field("used", &self.used())
            .field("read_pos", &self.read_pos)
            .field("capacity", &self.capacity)
            .finish()
    }
}
