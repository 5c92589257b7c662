//! Fixed-capacity circular byte store held in a persistent segment.
//!
//! Same `head + length` accounting as [`MemoryRing`](super::memory_ring::MemoryRing),
//! but positions are byte offsets into a [`Segment`]. Each call issues at most two
//! seek + transfer pairs, one per contiguous run of the circular window.
//!
//! I/O failures are returned as [`BufferError::Io`] and never retried. The ring's
//! accounting only advances for runs that completed, so a failed call leaves the
//! ring describing exactly the bytes that made it to (or from) the segment. A read
//! never consumes bytes it does not hand back.

use std::io::SeekFrom;

use crate::data::segment::{prepare_segment, Segment};
use crate::error::{BufferError, BufferResult};

/// Persistent tier of the spill buffer.
pub struct BackingRing<S: Segment> {
    segment: S,
    capacity: usize,
    head: usize,
    length: usize,
}

impl<S: Segment> std::fmt::Debug for BackingRing<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingRing")
            .field("capacity", &self.capacity)
            .field("head", &self.head)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

impl<S: Segment> BackingRing<S> {
    /// Take ownership of `segment` and use its first `capacity` bytes as the ring.
    ///
    /// The segment is padded with zeros up to `capacity` if it is shorter.
    ///
    /// # Errors
    /// [`BufferError::InvalidCapacity`] if `capacity` is 0, [`BufferError::Io`] if
    /// the segment cannot be prepared.
    pub fn new(mut segment: S, capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity(
                "backing tier capacity must be > 0".to_string(),
            ));
        }

        prepare_segment(&mut segment, capacity as u64)?;

        Ok(Self {
            segment,
            capacity,
            head: 0,
            length: 0,
        })
    }

    /// Append as many bytes of `data` as fit.
    ///
    /// Returns the number of bytes stored; a short count means the ring is full.
    ///
    /// # Errors
    /// [`BufferError::Io`] if seeking or writing the segment fails.
    pub fn write(&mut self, data: &[u8]) -> BufferResult<usize> {
        let count = data.len().min(self.free_space());
        let mut written = 0;

        while written < count {
            let tail = (self.head + self.length) % self.capacity;
            let run = (count - written).min(self.capacity - tail);

            self.segment.seek(SeekFrom::Start(tail as u64))?;
            self.segment.write_all(&data[written..written + run])?;

            self.length += run;
            written += run;
        }

        Ok(written)
    }

    /// Move up to `out.len()` of the oldest bytes into `out`.
    ///
    /// Returns the number of bytes copied (0 if the ring is empty). If the second
    /// run fails after the first completed, the first run's bytes are returned and
    /// the failure is left for the next call to hit.
    ///
    /// # Errors
    /// [`BufferError::Io`] if seeking or reading the segment fails before any byte
    /// was copied.
    pub fn read(&mut self, out: &mut [u8]) -> BufferResult<usize> {
        let count = out.len().min(self.length);
        let mut copied = 0;

        while copied < count {
            let run = (count - copied).min(self.capacity - self.head);

            let transfer = self
                .segment
                .seek(SeekFrom::Start(self.head as u64))
                .and_then(|_| self.segment.read_exact(&mut out[copied..copied + run]));
            match transfer {
                Ok(()) => {}
                Err(_) if copied > 0 => break,
                Err(e) => return Err(e.into()),
            }

            self.head = (self.head + run) % self.capacity;
            self.length -= run;
            copied += run;
        }

        Ok(copied)
    }

    /// Flush buffered writes through to the persistent medium.
    ///
    /// # Errors
    /// [`BufferError::Io`] if the handle fails to flush.
    pub fn flush(&mut self) -> BufferResult<()> {
        self.segment.flush()?;
        Ok(())
    }

    /// Number of valid bytes currently stored.
    pub fn used_space(&self) -> usize {
        self.length
    }

    /// Number of bytes that can be written before the ring is full.
    pub fn free_space(&self) -> usize {
        self.capacity - self.length
    }

    /// Capacity in bytes, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when no valid bytes are stored.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Borrow the underlying segment handle.
    pub fn segment(&self) -> &S {
        &self.segment
    }

    /// Release the ring and hand the segment back.
    pub fn into_segment(self) -> S {
        self.segment
    }
}
