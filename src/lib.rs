//! # spillbuf
//!
//! A bounded FIFO byte buffer in two tiers: a fixed-size in-memory ring that absorbs
//! bursts, and a larger ring laid over a persistent segment (a file, a memory-mapped
//! file, or anything that is `Read + Write + Seek`) that takes the overflow. One
//! producer and one consumer share a [`BufferCoordinator`]; bytes come out exactly in
//! the order they went in, regardless of which tier held them.
//!
//! ## Crate Structure
//!
//! - **`data`**: the storage engine.
//!   - `memory_ring`: [`MemoryRing`], the fast tier.
//!   - `backing_ring`: [`BackingRing`], the spill tier over a [`Segment`].
//!   - `segment`: the [`Segment`] trait, zero-fill bootstrap and [`MappedSegment`].
//!   - `coordinator`: [`BufferCoordinator`], the thread-safe two-tier stream.
//!   - `async_io`: [`AsyncBuffer`], a tokio facade over a shared coordinator.
//! - **`config`**: figment-based configuration (TOML file + `SPILLBUF_` environment).
//! - **`error`**: the [`BufferError`] enum shared by every operation.
//! - **`tracing_setup`**: `tracing-subscriber` initialisation for binaries and tests.
//!
//! ## Quick start
//!
//! ```no_run
//! use spillbuf::{BufferCoordinator, ReadTimeout};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> spillbuf::BufferResult<()> {
//! let buffer = Arc::new(BufferCoordinator::create(Path::new("/tmp/spill.seg"), 4096, 1 << 20)?);
//!
//! let producer = Arc::clone(&buffer);
//! std::thread::spawn(move || {
//!     producer.write(b"hello")?;
//!     producer.finish_write();
//!     Ok::<_, spillbuf::BufferError>(())
//! });
//!
//! let mut chunk = [0u8; 1024];
//! loop {
//!     let n = buffer.read(&mut chunk, ReadTimeout::Forever)?;
//!     if n == 0 {
//!         break;
//!     }
//!     // consume &chunk[..n]
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod tracing_setup;

pub use data::async_io::AsyncBuffer;
pub use data::backing_ring::BackingRing;
pub use data::coordinator::{BufferCoordinator, BufferState, BufferStats, ReadTimeout};
pub use data::memory_ring::MemoryRing;
pub use data::segment::{create_segment_file, prepare_segment, MappedSegment, Segment};
pub use error::{BufferError, BufferResult};
