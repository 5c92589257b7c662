#![allow(unsafe_code)]
//! Persistent segment handles for the backing tier.
//!
//! The backing tier only needs a handle it can seek, read, write and flush, so
//! any `Read + Write + Seek + Send` type is a [`Segment`]. Two concrete handles
//! are provided:
//!
//! - `std::fs::File`, created with [`create_segment_file`].
//! - [`MappedSegment`], a memory-mapped file (`memmap2`) that serves positioned
//!   reads and writes straight from the mapping.
//!
//! `std::io::Cursor<Vec<u8>>` also qualifies and is handy in tests.
//!
//! Segment creation and sizing belong to the caller; [`prepare_segment`] is the
//! bootstrap step that guarantees the handle is at least `capacity` bytes long and
//! zero-filled before a backing ring takes ownership of it.

use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{BufferError, BufferResult};

/// Size of the zero block used when padding a segment.
const ZERO_FILL_CHUNK: usize = 8 * 1024;

/// A seekable, readable, writable persistent handle.
pub trait Segment: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> Segment for T {}

/// Pad `segment` with zeros up to `capacity` bytes, flush it, and rewind.
///
/// Existing content is never truncated. Bytes already present below `capacity`
/// are left untouched; the backing ring never reads outside its valid window, so
/// stale content there is harmless.
///
/// # Errors
/// Propagates any seek/write/flush failure from the handle.
pub fn prepare_segment<S: Segment>(segment: &mut S, capacity: u64) -> io::Result<()> {
    let current_len = segment.seek(SeekFrom::End(0))?;

    if current_len < capacity {
        let zeros = [0u8; ZERO_FILL_CHUNK];
        let mut remaining = capacity - current_len;
        while remaining > 0 {
            let step = remaining.min(ZERO_FILL_CHUNK as u64) as usize;
            segment.write_all(&zeros[..step])?;
            remaining -= step as u64;
        }
    }

    segment.flush()?;
    segment.seek(SeekFrom::Start(0))?;
    Ok(())
}

/// Create (or truncate) a file at `path` sized and zero-filled to `capacity` bytes.
///
/// # Errors
/// Returns [`BufferError::InvalidCapacity`] for a zero capacity and
/// [`BufferError::Io`] if the file cannot be created or sized.
pub fn create_segment_file(path: &Path, capacity: usize) -> BufferResult<File> {
    if capacity == 0 {
        return Err(BufferError::InvalidCapacity(
            "backing segment capacity must be > 0".to_string(),
        ));
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    // set_len on a freshly truncated file extends it with zeros
    file.set_len(capacity as u64)?;

    tracing::debug!(path = %path.display(), capacity, "Created backing segment file");
    Ok(file)
}

/// Backing segment served from a memory-mapped file.
///
/// Positioned I/O is a plain copy into or out of the mapping. Writes past the end
/// of the mapping are short (and `write_all` reports `WriteZero`), so the segment
/// can never grow beyond the size it was created with.
pub struct MappedSegment {
    path: PathBuf,
    mmap: MmapMut,
    position: u64,
}

impl std::fmt::Debug for MappedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedSegment")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .field("position", &self.position)
            .finish()
    }
}

impl MappedSegment {
    /// Create (or truncate) the file at `path`, size it to `capacity` bytes and map it.
    ///
    /// # Errors
    /// Returns [`BufferError::InvalidCapacity`] for a zero capacity and
    /// [`BufferError::Io`] if the file cannot be created, sized or mapped.
    pub fn create(path: &Path, capacity: usize) -> BufferResult<Self> {
        let file = create_segment_file(path, capacity)?;

        // SAFETY: the file was just created and sized by us; the mapping is owned
        // exclusively by this segment and no other handle writes the file.
        let mmap = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };
        debug_assert_eq!(mmap.len(), capacity);

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            position: 0,
        })
    }

    /// Path of the mapped file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// True if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn offset(&self) -> usize {
        usize::try_from(self.position)
            .unwrap_or(usize::MAX)
            .min(self.mmap.len())
    }
}

impl Read for MappedSegment {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.offset();
        let count = buf.len().min(self.mmap.len() - start);
        buf[..count].copy_from_slice(&self.mmap[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for MappedSegment {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let start = self.offset();
        let count = buf.len().min(self.mmap.len() - start);
        self.mmap[start..start + count].copy_from_slice(&buf[..count]);
        self.position += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.mmap.flush()
    }
}

impl Seek for MappedSegment {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.mmap.len() as i128;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => len + delta as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
        };

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative offset",
            ));
        }

        self.position = u64::try_from(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek offset overflow"))?;
        Ok(self.position)
    }
}
