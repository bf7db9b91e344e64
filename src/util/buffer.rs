//! Buffer management for packet data

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::ops::Deref;

/// A reference-counted, immutable buffer of packet data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    /// Create a new buffer from bytes
    pub fn new(data: Bytes) -> Self {
        Buffer { data }
    }

    /// Create a buffer from a vector
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Buffer {
            data: Bytes::from(vec),
        }
    }

    /// Create an empty buffer
    pub fn empty() -> Self {
        Buffer { data: Bytes::new() }
    }

    /// Get the length of the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a slice of the buffer data
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Clone the bytes (cheap, reference counted)
    pub fn clone_bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(vec: Vec<u8>) -> Self {
        Buffer::from_vec(vec)
    }
}

/// A bounded, reusable scratch buffer that packets are read or encoded into.
///
/// The capacity is fixed at construction. `take` hands the filled bytes out
/// as an immutable [`Buffer`] and leaves the scratch buffer empty; once the
/// handed-out buffer is dropped the allocation is reclaimed on the next
/// `reserve`.
#[derive(Debug)]
pub struct PacketBuffer {
    data: BytesMut,
    capacity: usize,
}

impl PacketBuffer {
    /// Create a new scratch buffer holding at most `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        PacketBuffer {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of bytes this buffer accepts
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes still available before the capacity is reached
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Discard the contents, keeping the allocation
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get immutable access to the buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Append bytes, failing if the capacity would be exceeded
    pub fn extend_from_slice(&mut self, slice: &[u8]) -> Result<()> {
        if slice.len() > self.remaining() {
            return Err(Error::BufferTooSmall {
                need: self.data.len() + slice.len(),
                have: self.capacity,
            });
        }
        self.data.extend_from_slice(slice);
        Ok(())
    }

    /// Grow the contents by `len` zeroed bytes and return them for filling
    pub fn append_zeroed(&mut self, len: usize) -> Result<&mut [u8]> {
        if len > self.remaining() {
            return Err(Error::BufferTooSmall {
                need: self.data.len() + len,
                have: self.capacity,
            });
        }
        let start = self.data.len();
        self.data.resize(start + len, 0);
        Ok(&mut self.data[start..])
    }

    /// Shrink the contents to `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Hand out the current contents as an immutable buffer
    pub fn take(&mut self) -> Buffer {
        let filled = self.data.split().freeze();
        self.data.reserve(self.capacity);
        Buffer::new(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let buf = Buffer::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_buffer_empty() {
        let buf = Buffer::empty();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_packet_buffer_take_leaves_it_empty() {
        let mut buf = PacketBuffer::with_capacity(10);
        buf.extend_from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.remaining(), 7);

        let frozen = buf.take();
        assert_eq!(frozen.as_slice(), &[1, 2, 3]);
        assert!(buf.is_empty());
        assert_eq!(buf.remaining(), 10);
    }

    #[test]
    fn test_packet_buffer_respects_capacity() {
        let mut buf = PacketBuffer::with_capacity(4);
        buf.extend_from_slice(&[0; 3]).unwrap();
        let err = buf.extend_from_slice(&[0; 2]).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { need: 5, have: 4 }));

        let slot = buf.append_zeroed(1).unwrap();
        slot[0] = 9;
        assert_eq!(buf.as_slice(), &[0, 0, 0, 9]);
        assert!(buf.append_zeroed(1).is_err());
    }
}
