//! Two-tier FIFO coordinator.
//!
//! [`BufferCoordinator`] owns a [`MemoryRing`] and a [`BackingRing`] and presents
//! them as one bounded byte stream. Writes fill the memory tier first and spill
//! the remainder into the backing tier; reads drain the memory tier first, then
//! pull directly from the backing tier, and finally migrate backing bytes into
//! whatever memory space the read freed.
//!
//! # Ordering
//!
//! The stream is always `memory ++ backing`: every byte in the memory tier is
//! older than every byte in the backing tier. Writes only target the memory tier
//! while the backing tier is empty, and migration moves bytes from the backing
//! head to the memory tail, so no operation can reorder the stream.
//!
//! # Synchronization
//!
//! A single `parking_lot::Mutex` guards both rings and both flags. Only `read`
//! ever suspends, on a `Condvar` tied to that mutex, so writers, `finish_write`
//! and `cancel` can always make progress and wake it.
//!
//! | state     | `write`            | `read`                              |
//! |-----------|--------------------|-------------------------------------|
//! | Open      | Ok or `Overflow`   | data, or waits up to the timeout    |
//! | Finished  | `Finished`         | drains, then `Ok(0)` (end of stream) |
//! | Cancelled | `Cancelled`        | `Cancelled`                         |

use parking_lot::{Condvar, Mutex};
use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::data::backing_ring::BackingRing;
use crate::data::memory_ring::MemoryRing;
use crate::data::segment::{create_segment_file, MappedSegment, Segment};
use crate::error::{BufferError, BufferResult};

/// Scratch size for moving bytes from the backing tier into memory.
const MIGRATION_CHUNK: usize = 1024;

/// How long `read` may wait for the requested amount of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadTimeout {
    /// Return immediately with whatever is available.
    NoWait,
    /// Wait at most this long.
    Bounded(Duration),
    /// Wait until enough data arrives, the writer finishes, or the buffer is cancelled.
    #[default]
    Forever,
}

impl ReadTimeout {
    /// Absolute deadline for a wait starting at `now`; `None` means no deadline.
    fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            ReadTimeout::NoWait => Some(now),
            ReadTimeout::Bounded(limit) => now.checked_add(limit),
            ReadTimeout::Forever => None,
        }
    }
}

impl From<Duration> for ReadTimeout {
    fn from(value: Duration) -> Self {
        if value.is_zero() {
            ReadTimeout::NoWait
        } else {
            ReadTimeout::Bounded(value)
        }
    }
}

impl From<Option<Duration>> for ReadTimeout {
    fn from(value: Option<Duration>) -> Self {
        value.map_or(ReadTimeout::Forever, ReadTimeout::from)
    }
}

/// Lifecycle state derived from the two terminal flags; cancellation dominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferState {
    /// Accepting writes.
    #[default]
    Open,
    /// The producer finished; remaining bytes can still be drained.
    Finished,
    /// Cancelled; no further data transfer.
    Cancelled,
}

impl std::fmt::Display for BufferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BufferState::Open => "open",
            BufferState::Finished => "finished",
            BufferState::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Point-in-time view of tier usage and lifetime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    /// Current lifecycle state
    pub state: BufferState,
    /// Bytes held by the memory tier
    pub memory_used: usize,
    /// Memory tier capacity
    pub memory_capacity: usize,
    /// Bytes held by the backing tier
    pub backing_used: usize,
    /// Backing tier capacity
    pub backing_capacity: usize,
    /// Total bytes accepted by `write`
    pub bytes_written: u64,
    /// Total bytes returned by `read`
    pub bytes_read: u64,
    /// Total bytes moved from the backing tier into memory
    pub bytes_migrated: u64,
    /// Number of writes rejected with `Overflow`
    pub overflow_events: u64,
}

impl BufferStats {
    /// Bytes currently buffered across both tiers.
    pub fn available(&self) -> usize {
        self.memory_used + self.backing_used
    }

    /// Combined capacity of both tiers.
    pub fn total_capacity(&self) -> usize {
        self.memory_capacity + self.backing_capacity
    }
}

#[derive(Debug, Default)]
struct Counters {
    bytes_written: u64,
    bytes_read: u64,
    bytes_migrated: u64,
    overflow_events: u64,
}

/// Everything guarded by the coordinator lock.
struct Tiers<S: Segment> {
    memory: MemoryRing,
    backing: BackingRing<S>,
    write_finished: bool,
    cancelled: bool,
    counters: Counters,
}

impl<S: Segment> Tiers<S> {
    fn available(&self) -> usize {
        self.memory.used_space() + self.backing.used_space()
    }

    fn state(&self) -> BufferState {
        if self.cancelled {
            BufferState::Cancelled
        } else if self.write_finished {
            BufferState::Finished
        } else {
            BufferState::Open
        }
    }

    /// Store as much of `data` as both tiers can take, memory first.
    fn place(&mut self, data: &[u8]) -> BufferResult<()> {
        let mut placed = 0;
        if self.backing.is_empty() {
            placed = self.memory.write(data);
        }
        if placed < data.len() {
            self.backing.write(&data[placed..])?;
        }
        Ok(())
    }

    /// Copy up to `out.len()` bytes, memory tier first, then straight from the backing tier.
    ///
    /// Bytes already taken from memory are never discarded: a backing failure after
    /// them yields a short count, and the failure is reported by the next call that
    /// cannot make progress.
    fn take(&mut self, out: &mut [u8]) -> BufferResult<usize> {
        let mut copied = self.memory.read(out);
        if copied < out.len() {
            match self.backing.read(&mut out[copied..]) {
                Ok(n) => copied += n,
                Err(e) if copied > 0 => {
                    warn!(copied, error = %e, "Backing tier read failed, returning memory bytes");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(copied)
    }

    /// Refill freed memory space from the head of the backing tier.
    fn migrate(&mut self) -> BufferResult<usize> {
        let mut scratch = [0u8; MIGRATION_CHUNK];
        let mut moved = 0;

        loop {
            let step = self
                .memory
                .free_space()
                .min(self.backing.used_space())
                .min(MIGRATION_CHUNK);
            if step == 0 {
                break;
            }

            let pulled = self.backing.read(&mut scratch[..step])?;
            let stored = self.memory.write(&scratch[..pulled]);
            debug_assert_eq!(stored, pulled, "memory tier rejected migrated bytes");
            moved += stored;
            self.counters.bytes_migrated += stored as u64;
        }

        Ok(moved)
    }

    fn stats(&self) -> BufferStats {
        BufferStats {
            state: self.state(),
            memory_used: self.memory.used_space(),
            memory_capacity: self.memory.capacity(),
            backing_used: self.backing.used_space(),
            backing_capacity: self.backing.capacity(),
            bytes_written: self.counters.bytes_written,
            bytes_read: self.counters.bytes_read,
            bytes_migrated: self.counters.bytes_migrated,
            overflow_events: self.counters.overflow_events,
        }
    }
}

/// Bounded two-tier FIFO byte buffer shared between producer and consumer threads.
///
/// Share it by reference or behind an `Arc`; every operation takes `&self`.
/// [`teardown`](Self::teardown) consumes the coordinator, so it can only run once
/// every other handle has been dropped.
///
/// # Example
/// ```
/// use spillbuf::{BufferCoordinator, ReadTimeout};
/// use std::io::Cursor;
///
/// # fn main() -> spillbuf::BufferResult<()> {
/// let buffer = BufferCoordinator::new(4, 16, Cursor::new(Vec::new()))?;
/// buffer.write(b"spills past memory")?;
/// buffer.finish_write();
///
/// let mut out = [0u8; 32];
/// let n = buffer.read(&mut out, ReadTimeout::Forever)?;
/// assert_eq!(&out[..n], b"spills past memory");
/// assert_eq!(buffer.read(&mut out, ReadTimeout::Forever)?, 0);
/// buffer.teardown()?;
/// # Ok(())
/// # }
/// ```
pub struct BufferCoordinator<S: Segment> {
    tiers: Mutex<Tiers<S>>,
    data_ready: Condvar,
}

impl<S: Segment> std::fmt::Debug for BufferCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCoordinator")
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S: Segment> BufferCoordinator<S> {
    /// Build a coordinator over a fresh memory tier and the given backing segment.
    ///
    /// The segment is zero-filled up to `backing_capacity` before use.
    ///
    /// # Errors
    /// [`BufferError::InvalidCapacity`] if either capacity is 0, [`BufferError::Io`]
    /// if the segment cannot be prepared.
    pub fn new(memory_capacity: usize, backing_capacity: usize, segment: S) -> BufferResult<Self> {
        let memory = MemoryRing::new(memory_capacity)?;
        let backing = BackingRing::new(segment, backing_capacity)?;

        debug!(memory_capacity, backing_capacity, "BufferCoordinator created");

        Ok(Self {
            tiers: Mutex::new(Tiers {
                memory,
                backing,
                write_finished: false,
                cancelled: false,
                counters: Counters::default(),
            }),
            data_ready: Condvar::new(),
        })
    }

    /// Append `data` to the stream.
    ///
    /// # Errors
    /// - [`BufferError::Cancelled`] after [`cancel`](Self::cancel).
    /// - [`BufferError::Finished`] after [`finish_write`](Self::finish_write).
    /// - [`BufferError::Overflow`] if both tiers filled up first. The bytes that
    ///   did fit stay committed and are not rolled back.
    /// - [`BufferError::Io`] if the backing segment failed.
    pub fn write(&self, data: &[u8]) -> BufferResult<()> {
        let mut tiers = self.tiers.lock();

        if tiers.cancelled {
            return Err(BufferError::Cancelled);
        }
        if tiers.write_finished {
            return Err(BufferError::Finished);
        }

        let before = tiers.available();
        let outcome = tiers.place(data);
        let committed = tiers.available() - before;
        tiers.counters.bytes_written += committed as u64;

        if committed > 0 {
            self.data_ready.notify_all();
        }

        outcome?;

        if committed < data.len() {
            tiers.counters.overflow_events += 1;
            warn!(
                committed,
                requested = data.len(),
                "Write overflowed both buffer tiers"
            );
            return Err(BufferError::Overflow {
                committed,
                requested: data.len(),
            });
        }

        trace!(
            bytes = committed,
            memory_used = tiers.memory.used_space(),
            backing_used = tiers.backing.used_space(),
            "write"
        );
        Ok(())
    }

    /// Read up to `out.len()` bytes from the front of the stream.
    ///
    /// Waits (up to `timeout`) until `out.len()` bytes are buffered, the writer
    /// finishes, or the buffer is cancelled. A timeout is not an error: whatever is
    /// available is returned, possibly nothing. `Ok(0)` together with
    /// [`is_write_finished`](Self::is_write_finished) is end of stream.
    ///
    /// # Errors
    /// - [`BufferError::Cancelled`] if the buffer is or becomes cancelled, even
    ///   when data is available.
    /// - [`BufferError::Io`] if the backing segment failed before any byte could
    ///   be delivered. A failure after some bytes were taken shortens the read
    ///   instead, so nothing leaves the buffer without reaching the caller.
    pub fn read(&self, out: &mut [u8], timeout: ReadTimeout) -> BufferResult<usize> {
        let wanted = out.len();
        let deadline = timeout.deadline(Instant::now());
        let mut tiers = self.tiers.lock();

        while !tiers.cancelled && !tiers.write_finished && tiers.available() < wanted {
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    if self.data_ready.wait_until(&mut tiers, deadline).timed_out() {
                        break;
                    }
                }
                None => self.data_ready.wait(&mut tiers),
            }
        }

        if tiers.cancelled {
            return Err(BufferError::Cancelled);
        }

        let copied = tiers.take(out)?;
        tiers.counters.bytes_read += copied as u64;
        let migrated = match tiers.migrate() {
            Ok(moved) => moved,
            // the copied bytes are already off the ring; deliver them first
            Err(e) if copied > 0 => {
                warn!(copied, error = %e, "Migration failed, deferring the error");
                0
            }
            Err(e) => return Err(e),
        };

        trace!(
            requested = wanted,
            copied,
            migrated,
            memory_used = tiers.memory.used_space(),
            backing_used = tiers.backing.used_space(),
            "read"
        );
        Ok(copied)
    }

    /// Read up to `max_bytes` into a freshly allocated vector.
    ///
    /// # Errors
    /// Same as [`read`](Self::read).
    pub fn read_to_vec(&self, max_bytes: usize, timeout: ReadTimeout) -> BufferResult<Vec<u8>> {
        let mut out = vec![0u8; max_bytes];
        let n = self.read(&mut out, timeout)?;
        out.truncate(n);
        Ok(out)
    }

    /// Declare that no more bytes will be written and wake every blocked reader.
    ///
    /// Idempotent.
    pub fn finish_write(&self) {
        let mut tiers = self.tiers.lock();
        if !tiers.write_finished {
            tiers.write_finished = true;
            info!(buffered = tiers.available(), "Producer finished writing");
        }
        self.data_ready.notify_all();
    }

    /// Cancel the buffer for good and wake every blocked reader.
    ///
    /// Idempotent; there is no way back to a usable state.
    pub fn cancel(&self) {
        let mut tiers = self.tiers.lock();
        if !tiers.cancelled {
            tiers.cancelled = true;
            info!(discarded = tiers.available(), "Buffer cancelled");
        }
        self.data_ready.notify_all();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BufferState {
        self.tiers.lock().state()
    }

    /// True once [`finish_write`](Self::finish_write) has been called.
    pub fn is_write_finished(&self) -> bool {
        self.tiers.lock().write_finished
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.tiers.lock().cancelled
    }

    /// Bytes buffered across both tiers.
    pub fn available(&self) -> usize {
        self.tiers.lock().available()
    }

    /// Bytes held by the memory tier.
    pub fn memory_used(&self) -> usize {
        self.tiers.lock().memory.used_space()
    }

    /// Bytes held by the backing tier.
    pub fn backing_used(&self) -> usize {
        self.tiers.lock().backing.used_space()
    }

    /// Snapshot of usage and lifetime counters.
    pub fn stats(&self) -> BufferStats {
        self.tiers.lock().stats()
    }

    /// Flush and release the backing segment.
    ///
    /// # Errors
    /// [`BufferError::Io`] if the final flush fails; the segment is released either way.
    pub fn teardown(self) -> BufferResult<()> {
        self.into_segment().map(drop)
    }

    /// Flush the backing segment and hand it back to the caller.
    ///
    /// # Errors
    /// [`BufferError::Io`] if the final flush fails.
    pub fn into_segment(self) -> BufferResult<S> {
        let mut tiers = self.tiers.into_inner();
        let stats = tiers.stats();
        tiers.backing.flush()?;

        debug!(
            state = %stats.state,
            bytes_written = stats.bytes_written,
            bytes_read = stats.bytes_read,
            bytes_migrated = stats.bytes_migrated,
            "BufferCoordinator torn down"
        );
        Ok(tiers.backing.into_segment())
    }
}

impl BufferCoordinator<File> {
    /// Create a coordinator backed by a new zero-filled file at `path`.
    ///
    /// # Errors
    /// See [`create_segment_file`] and [`BufferCoordinator::new`].
    pub fn create(path: &Path, memory_capacity: usize, backing_capacity: usize) -> BufferResult<Self> {
        let file = create_segment_file(path, backing_capacity)?;
        Self::new(memory_capacity, backing_capacity, file)
    }
}

impl BufferCoordinator<MappedSegment> {
    /// Create a coordinator backed by a memory-mapped file at `path`.
    ///
    /// # Errors
    /// See [`MappedSegment::create`] and [`BufferCoordinator::new`].
    pub fn create_mapped(
        path: &Path,
        memory_capacity: usize,
        backing_capacity: usize,
    ) -> BufferResult<Self> {
        let segment = MappedSegment::create(path, backing_capacity)?;
        Self::new(memory_capacity, backing_capacity, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read, Seek, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tracing_test::traced_test;

    type CursorBuffer = BufferCoordinator<Cursor<Vec<u8>>>;

    fn buffer(memory: usize, backing: usize) -> CursorBuffer {
        BufferCoordinator::new(memory, backing, Cursor::new(Vec::new())).unwrap()
    }

    #[test]
    fn test_rejects_zero_capacities() {
        assert!(matches!(
            BufferCoordinator::new(0, 16, Cursor::new(Vec::new())),
            Err(BufferError::InvalidCapacity(_))
        ));
        assert!(matches!(
            BufferCoordinator::new(16, 0, Cursor::new(Vec::new())),
            Err(BufferError::InvalidCapacity(_))
        ));
    }

    #[test]
    fn test_write_fills_memory_before_backing() {
        let buf = buffer(8, 32);
        buf.write(b"0123456789ab").unwrap();

        assert_eq!(buf.memory_used(), 8);
        assert_eq!(buf.backing_used(), 4);
        assert_eq!(buf.available(), 12);
    }

    #[test]
    fn test_read_pulls_through_backing_and_migrates() {
        let buf = buffer(4, 16);
        buf.write(b"abcdefghij").unwrap();

        let mut out = [0u8; 6];
        assert_eq!(buf.read(&mut out, ReadTimeout::NoWait).unwrap(), 6);
        assert_eq!(&out, b"abcdef");

        // the remaining four bytes fit in memory again
        assert_eq!(buf.memory_used(), 4);
        assert_eq!(buf.backing_used(), 0);
        assert_eq!(buf.stats().bytes_migrated, 4);

        let mut out = [0u8; 4];
        assert_eq!(buf.read(&mut out, ReadTimeout::NoWait).unwrap(), 4);
        assert_eq!(&out, b"ghij");
    }

    #[test]
    fn test_writes_queue_behind_backing_bytes() {
        let buf = buffer(4, 16);
        buf.write(b"abcdef").unwrap();

        let mut one = [0u8; 1];
        buf.read(&mut one, ReadTimeout::NoWait).unwrap();
        assert_eq!(&one, b"a");

        buf.write(b"XY").unwrap();
        let out = buf.read_to_vec(16, ReadTimeout::NoWait).unwrap();
        assert_eq!(out, b"bcdefXY");
    }

    #[test]
    fn test_overflow_commits_prefix() {
        let buf = buffer(16, 16);
        let data: Vec<u8> = (0..40).collect();

        match buf.write(&data) {
            Err(BufferError::Overflow {
                committed,
                requested,
            }) => {
                assert_eq!(committed, 32);
                assert_eq!(requested, 40);
            }
            other => panic!("expected overflow, got {:?}", other),
        }

        let stats = buf.stats();
        assert_eq!(stats.overflow_events, 1);
        assert_eq!(stats.bytes_written, 32);

        let out = buf.read_to_vec(64, ReadTimeout::NoWait).unwrap();
        assert_eq!(out, data[..32].to_vec());
    }

    #[test]
    #[traced_test]
    fn overflow_is_logged() {
        let buf = buffer(2, 2);
        assert!(buf.write(b"abcdef").is_err());
        assert!(logs_contain("Write overflowed both buffer tiers"));

        buf.cancel();
        assert!(logs_contain("Buffer cancelled"));
    }

    #[test]
    fn test_write_after_finish_fails() {
        let buf = buffer(8, 8);
        buf.finish_write();
        buf.finish_write();
        assert!(matches!(buf.write(b"x"), Err(BufferError::Finished)));
        assert_eq!(buf.state(), BufferState::Finished);
    }

    #[test]
    fn test_cancel_dominates_finish() {
        let buf = buffer(8, 8);
        buf.write(b"data").unwrap();
        buf.finish_write();
        buf.cancel();

        assert_eq!(buf.state(), BufferState::Cancelled);
        assert!(matches!(buf.write(b"x"), Err(BufferError::Cancelled)));
        let mut out = [0u8; 4];
        assert!(matches!(
            buf.read(&mut out, ReadTimeout::NoWait),
            Err(BufferError::Cancelled)
        ));
    }

    #[test]
    fn test_finished_short_read_then_eof() {
        let buf = buffer(8, 8);
        buf.write(b"abc").unwrap();
        buf.finish_write();

        let mut out = [0u8; 8];
        assert_eq!(buf.read(&mut out, ReadTimeout::Forever).unwrap(), 3);
        assert_eq!(buf.read(&mut out, ReadTimeout::Forever).unwrap(), 0);
    }

    #[test]
    fn test_timeout_returns_short_read() {
        let buf = buffer(8, 8);
        buf.write(b"ab").unwrap();

        let start = Instant::now();
        let mut out = [0u8; 8];
        let n = buf
            .read(&mut out, ReadTimeout::Bounded(Duration::from_millis(30)))
            .unwrap();
        assert_eq!(n, 2);
        assert!(start.elapsed() >= Duration::from_millis(30));

        // nothing buffered and nothing finished: a zero-length, non-EOF result
        assert_eq!(buf.read(&mut out, ReadTimeout::NoWait).unwrap(), 0);
        assert!(!buf.is_write_finished());
    }

    #[test]
    fn test_zero_length_read_does_not_block() {
        let buf = buffer(8, 8);
        let mut out = [0u8; 0];
        assert_eq!(buf.read(&mut out, ReadTimeout::Forever).unwrap(), 0);
    }

    #[test]
    fn test_blocked_reader_woken_by_write() {
        let buf = Arc::new(buffer(8, 8));
        let reader = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || buf.read_to_vec(6, ReadTimeout::Forever))
        };

        thread::sleep(Duration::from_millis(20));
        buf.write(b"abc").unwrap();
        thread::sleep(Duration::from_millis(20));
        buf.write(b"def").unwrap();

        assert_eq!(reader.join().unwrap().unwrap(), b"abcdef");
    }

    #[test]
    fn test_blocked_reader_woken_by_cancel() {
        let buf = Arc::new(buffer(8, 8));
        buf.write(b"ab").unwrap();

        let reader = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || buf.read_to_vec(8, ReadTimeout::Forever))
        };

        thread::sleep(Duration::from_millis(20));
        buf.cancel();

        assert!(matches!(
            reader.join().unwrap(),
            Err(BufferError::Cancelled)
        ));
    }

    /// In-memory segment whose reads and writes can be switched off mid-test.
    struct SwitchedSegment {
        inner: Cursor<Vec<u8>>,
        reads_fail: Arc<AtomicBool>,
        writes_fail: Arc<AtomicBool>,
    }

    impl Read for SwitchedSegment {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.reads_fail.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "gone"));
            }
            self.inner.read(buf)
        }
    }

    impl Write for SwitchedSegment {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.writes_fail.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "gone"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for SwitchedSegment {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn switched_buffer(
        memory: usize,
        backing: usize,
    ) -> (BufferCoordinator<SwitchedSegment>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let reads_fail = Arc::new(AtomicBool::new(false));
        let writes_fail = Arc::new(AtomicBool::new(false));
        let segment = SwitchedSegment {
            inner: Cursor::new(Vec::new()),
            reads_fail: Arc::clone(&reads_fail),
            writes_fail: Arc::clone(&writes_fail),
        };
        let buf = BufferCoordinator::new(memory, backing, segment).unwrap();
        (buf, reads_fail, writes_fail)
    }

    #[test]
    fn test_backing_read_failure_keeps_memory_bytes() {
        let (buf, reads_fail, _) = switched_buffer(4, 16);
        buf.write(b"abcdefgh").unwrap();
        reads_fail.store(true, Ordering::SeqCst);

        let mut out = [0u8; 8];
        assert_eq!(buf.read(&mut out, ReadTimeout::NoWait).unwrap(), 4);
        assert_eq!(&out[..4], b"abcd");
        assert_eq!(buf.available(), 4);
        assert_eq!(buf.stats().bytes_read, 4);

        // nothing left in memory: the failure is now reported
        assert!(matches!(
            buf.read(&mut out, ReadTimeout::NoWait),
            Err(BufferError::Io(_))
        ));
        assert_eq!(buf.available(), 4);

        reads_fail.store(false, Ordering::SeqCst);
        assert_eq!(buf.read_to_vec(8, ReadTimeout::NoWait).unwrap(), b"efgh");
    }

    #[test]
    fn test_migration_failure_is_deferred() {
        let (buf, reads_fail, _) = switched_buffer(4, 16);
        buf.write(b"abcdefgh").unwrap();
        reads_fail.store(true, Ordering::SeqCst);

        let mut out = [0u8; 2];
        assert_eq!(buf.read(&mut out, ReadTimeout::NoWait).unwrap(), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(buf.memory_used(), 2);
        assert_eq!(buf.backing_used(), 4);
        assert_eq!(buf.stats().bytes_migrated, 0);

        reads_fail.store(false, Ordering::SeqCst);
        assert_eq!(buf.read_to_vec(8, ReadTimeout::NoWait).unwrap(), b"cdefgh");
    }

    #[test]
    fn test_spill_write_failure_keeps_committed_prefix() {
        let (buf, _, writes_fail) = switched_buffer(4, 16);
        writes_fail.store(true, Ordering::SeqCst);

        assert!(matches!(buf.write(b"abcdefgh"), Err(BufferError::Io(_))));
        assert_eq!(buf.available(), 4);
        assert_eq!(buf.stats().bytes_written, 4);

        // the failed spill left no backing bytes behind, so later writes follow the prefix
        writes_fail.store(false, Ordering::SeqCst);
        buf.write(b"XY").unwrap();
        assert_eq!(buf.read_to_vec(8, ReadTimeout::NoWait).unwrap(), b"abcdXY");
    }

    #[test]
    fn test_into_segment_returns_handle() {
        let buf = buffer(2, 8);
        buf.write(b"abcd").unwrap();
        let segment = buf.into_segment().unwrap();
        assert_eq!(segment.get_ref().len(), 8);
        assert_eq!(&segment.get_ref()[..2], b"cd");
    }

    #[test]
    fn test_read_timeout_conversions() {
        assert_eq!(ReadTimeout::from(Duration::ZERO), ReadTimeout::NoWait);
        assert_eq!(
            ReadTimeout::from(Duration::from_secs(1)),
            ReadTimeout::Bounded(Duration::from_secs(1))
        );
        assert_eq!(ReadTimeout::from(None), ReadTimeout::Forever);
        assert_eq!(ReadTimeout::default(), ReadTimeout::Forever);
    }
}
