//! CLI entry point for spillbuf
//!
//! Provides a command-line interface for:
//! - Piping stdin to stdout through a two-tier spill buffer
//! - Printing the merged configuration
//!
//! # Usage
//!
//! Buffer a bursty producer:
//! ```bash
//! producer | spillbuf pipe --memory 65536 --backing 67108864 --segment /tmp/spill.seg | consumer
//! ```
//!
//! Inspect configuration after file and environment overrides:
//! ```bash
//! SPILLBUF_BUFFER__SEGMENT_KIND=mmap spillbuf show-config
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use spillbuf::config::{SegmentKind, SpillbufConfig, DEFAULT_CONFIG_PATH};
use spillbuf::{tracing_setup, BufferCoordinator, BufferError, BufferStats, ReadTimeout, Segment};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pause before retrying a write that overflowed both tiers.
const OVERFLOW_BACKOFF: Duration = Duration::from_millis(5);

/// Pause between polls when the consumer reads without waiting.
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(name = "spillbuf")]
#[command(about = "Bounded two-tier FIFO byte buffer", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy stdin to stdout through the buffer
    Pipe {
        /// Memory tier capacity in bytes
        #[arg(long)]
        memory: Option<usize>,

        /// Backing tier capacity in bytes
        #[arg(long)]
        backing: Option<usize>,

        /// Backing segment file
        #[arg(long)]
        segment: Option<PathBuf>,

        /// Use a memory-mapped backing segment
        #[arg(long)]
        mmap: bool,

        /// Consumer read timeout in milliseconds (0 = poll)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SpillbufConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Pipe {
            memory,
            backing,
            segment,
            mmap,
            timeout_ms,
        } => {
            if let Some(memory) = memory {
                config.buffer.memory_capacity = memory;
            }
            if let Some(backing) = backing {
                config.buffer.backing_capacity = backing;
            }
            if let Some(segment) = segment {
                config.buffer.segment_path = segment;
            }
            if mmap {
                config.buffer.segment_kind = SegmentKind::Mmap;
            }
            if timeout_ms.is_some() {
                config.buffer.read_timeout_ms = timeout_ms;
            }
            config.validate()?;
            tracing_setup::init_from_config(&config).map_err(|e| anyhow!(e))?;
            run_pipe(config).await
        }
        Commands::ShowConfig => {
            config.validate()?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", rendered);
            Ok(())
        }
    }
}

async fn run_pipe(config: SpillbufConfig) -> Result<()> {
    let settings = &config.buffer;
    info!(
        memory_capacity = settings.memory_capacity,
        backing_capacity = settings.backing_capacity,
        segment = %settings.segment_path.display(),
        kind = ?settings.segment_kind,
        "Starting pipe"
    );

    match settings.segment_kind {
        SegmentKind::File => {
            let buffer = BufferCoordinator::create(
                &settings.segment_path,
                settings.memory_capacity,
                settings.backing_capacity,
            )
            .context("Failed to create file-backed buffer")?;
            pump(buffer, &config).await
        }
        SegmentKind::Mmap => {
            let buffer = BufferCoordinator::create_mapped(
                &settings.segment_path,
                settings.memory_capacity,
                settings.backing_capacity,
            )
            .context("Failed to create memory-mapped buffer")?;
            pump(buffer, &config).await
        }
    }
}

/// Run the producer and consumer halves against one buffer, then tear it down.
async fn pump<S: Segment + 'static>(buffer: BufferCoordinator<S>, config: &SpillbufConfig) -> Result<()> {
    let buffer = Arc::new(buffer);
    let chunk_size = config.buffer.chunk_size;
    let timeout = config.buffer.read_timeout();

    // Ctrl-C cancels the buffer; a weak handle keeps teardown possible.
    let interrupt = {
        let weak = Arc::downgrade(&buffer);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                if let Some(buffer) = weak.upgrade() {
                    warn!("Interrupted, cancelling buffer");
                    buffer.cancel();
                }
            }
        })
    };

    // stdin reads cannot be interrupted, so the producer lives on a plain thread.
    let producer = {
        let buffer = Arc::clone(&buffer);
        thread::Builder::new()
            .name("spillbuf-producer".to_string())
            .spawn(move || produce(&buffer, chunk_size))
            .context("Failed to spawn producer thread")?
    };

    let consumer = {
        let buffer = Arc::clone(&buffer);
        tokio::task::spawn_blocking(move || consume(&buffer, chunk_size, timeout))
    };

    let consumed = consumer.await.context("Consumer task failed")?;
    interrupt.abort();
    log_stats(&buffer.stats());

    if let Err(e) = consumed {
        // Unblock a producer still waiting on stdin by cancelling; don't join it.
        buffer.cancel();
        return Err(e);
    }

    match producer.join() {
        Ok(result) => result?,
        Err(_) => return Err(anyhow!("Producer thread panicked")),
    }

    let buffer = Arc::try_unwrap(buffer).map_err(|_| anyhow!("Buffer still shared at teardown"))?;
    buffer.teardown().context("Failed to tear down buffer")?;
    info!("Pipe complete");
    Ok(())
}

fn produce<S: Segment>(buffer: &BufferCoordinator<S>, chunk_size: usize) -> Result<()> {
    let mut stdin = io::stdin().lock();
    let mut chunk = vec![0u8; chunk_size];

    loop {
        let n = match stdin.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                buffer.cancel();
                return Err(e).context("Failed to read stdin");
            }
        };

        let mut pending = &chunk[..n];
        while !pending.is_empty() {
            match buffer.write(pending) {
                Ok(()) => break,
                Err(BufferError::Overflow { committed, .. }) => {
                    pending = &pending[committed..];
                    thread::sleep(OVERFLOW_BACKOFF);
                }
                Err(BufferError::Cancelled) => return Ok(()),
                Err(e) => {
                    error!(error = %e, "Producer write failed");
                    buffer.cancel();
                    return Err(e.into());
                }
            }
        }
    }

    buffer.finish_write();
    Ok(())
}

fn consume<S: Segment>(
    buffer: &BufferCoordinator<S>,
    chunk_size: usize,
    timeout: ReadTimeout,
) -> Result<()> {
    let mut stdout = io::stdout().lock();
    let mut chunk = vec![0u8; chunk_size];

    loop {
        let n = match buffer.read(&mut chunk, timeout) {
            Ok(n) => n,
            Err(BufferError::Cancelled) => return Err(anyhow!("Buffer cancelled")),
            Err(e) => return Err(e).context("Consumer read failed"),
        };

        if n == 0 {
            if buffer.is_write_finished() && buffer.available() == 0 {
                break;
            }
            if let Some(pause) = idle_pause(timeout) {
                thread::sleep(pause);
            }
            continue;
        }

        if let Err(e) = stdout.write_all(&chunk[..n]) {
            buffer.cancel();
            return Err(e).context("Failed to write stdout");
        }
    }

    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// How long to sleep after an empty read before polling again.
///
/// A waiting read already slept inside the buffer; a non-waiting one would spin.
fn idle_pause(timeout: ReadTimeout) -> Option<Duration> {
    match timeout {
        ReadTimeout::NoWait => Some(IDLE_BACKOFF),
        ReadTimeout::Bounded(_) | ReadTimeout::Forever => None,
    }
}

fn log_stats(stats: &BufferStats) {
    info!(
        state = %stats.state,
        bytes_written = stats.bytes_written,
        bytes_read = stats.bytes_read,
        bytes_migrated = stats.bytes_migrated,
        overflow_events = stats.overflow_events,
        "Buffer statistics"
    );
}
