//! Fixed-capacity circular byte store held in memory.
//!
//! The ring tracks its valid window as `head + length` rather than head/tail
//! indices, so a full ring and an empty ring are never ambiguous.
//!
//! # Invariants
//! - `head < capacity` and `length <= capacity`.
//! - The valid bytes are `buffer[head..head + length]` modulo `capacity`; they may
//!   wrap, in which case they occupy at most two contiguous runs.

use crate::error::{BufferError, BufferResult};

/// In-memory tier of the spill buffer.
///
/// `MemoryRing` never blocks and never fails once constructed: a full ring is
/// signalled by a short write count, an empty one by a zero read count.
#[derive(Debug)]
pub struct MemoryRing {
    buffer: Box<[u8]>,
    head: usize,
    length: usize,
}

impl MemoryRing {
    /// Allocate a zeroed ring of `capacity` bytes.
    ///
    /// # Errors
    /// Returns [`BufferError::InvalidCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity(
                "memory tier capacity must be > 0".to_string(),
            ));
        }

        Ok(Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            length: 0,
        })
    }

    /// Copy as many bytes of `data` as fit into free slots.
    ///
    /// Returns the number of bytes stored, which is less than `data.len()` only
    /// when the ring filled up.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let capacity = self.capacity();
        let count = data.len().min(self.free_space());
        if count == 0 {
            return 0;
        }

        let tail = (self.head + self.length) % capacity;
        let first_len = count.min(capacity - tail);
        self.buffer[tail..tail + first_len].copy_from_slice(&data[..first_len]);

        let second_len = count - first_len;
        if second_len > 0 {
            self.buffer[..second_len].copy_from_slice(&data[first_len..count]);
        }

        self.length += count;
        count
    }

    /// Move up to `out.len()` of the oldest bytes into `out`.
    ///
    /// Returns the number of bytes copied (0 if the ring is empty).
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let capacity = self.capacity();
        let count = out.len().min(self.length);
        if count == 0 {
            return 0;
        }

        let first_len = count.min(capacity - self.head);
        out[..first_len].copy_from_slice(&self.buffer[self.head..self.head + first_len]);

        let second_len = count - first_len;
        if second_len > 0 {
            out[first_len..count].copy_from_slice(&self.buffer[..second_len]);
        }

        self.head = (self.head + count) % capacity;
        self.length -= count;
        count
    }

    /// Number of valid bytes currently stored.
    pub fn used_space(&self) -> usize {
        self.length
    }

    /// Number of bytes that can be written before the ring is full.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.length
    }

    /// Total capacity in bytes, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// True when no valid bytes are stored.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// True when every slot holds a valid byte.
    pub fn is_full(&self) -> bool {
        self.length == self.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            MemoryRing::new(0),
            Err(BufferError::InvalidCapacity(_))
        ));
    }

    #[test]
    fn test_write_and_read() {
        let mut ring = MemoryRing::new(16).unwrap();
        assert_eq!(ring.write(b"hello"), 5);
        assert_eq!(ring.used_space(), 5);
        assert_eq!(ring.free_space(), 11);

        let mut out = [0u8; 5];
        assert_eq!(ring.read(&mut out), 5);
        assert_eq!(&out, b"hello");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_short_write_when_full() {
        let mut ring = MemoryRing::new(4).unwrap();
        assert_eq!(ring.write(b"abcdef"), 4);
        assert!(ring.is_full());
        assert_eq!(ring.write(b"x"), 0);

        let mut out = [0u8; 8];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(&out[..4], b"abcd");
    }

    #[test]
    fn test_read_from_empty_returns_zero() {
        let mut ring = MemoryRing::new(4).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out), 0);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring = MemoryRing::new(8).unwrap();
        assert_eq!(ring.write(b"012345"), 6);

        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(&out, b"0123");

        // head = 4, length = 2; this write wraps past the end of the buffer
        assert_eq!(ring.write(b"abcdef"), 6);
        assert!(ring.is_full());

        let mut out = [0u8; 8];
        assert_eq!(ring.read(&mut out), 8);
        assert_eq!(&out, b"45abcdef");
    }

    #[test]
    fn test_partial_reads_across_wrap() {
        let mut ring = MemoryRing::new(5).unwrap();
        let mut sink = [0u8; 3];
        let mut collected = Vec::new();

        for chunk in [b"abc".as_slice(), b"de", b"fgh", b"ij"] {
            assert_eq!(ring.write(chunk), chunk.len());
            let n = ring.read(&mut sink);
            collected.extend_from_slice(&sink[..n]);
        }
        let mut rest = [0u8; 5];
        let n = ring.read(&mut rest);
        collected.extend_from_slice(&rest[..n]);

        assert_eq!(collected, b"abcdefghij");
    }
}
