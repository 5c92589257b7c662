//! Configuration loading using Figment.
//!
//! Configuration is merged from:
//! 1. built-in defaults (every field has one, so a missing file is fine)
//! 2. a TOML file (`config/spillbuf.toml` by default)
//! 3. environment variables prefixed with `SPILLBUF_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use spillbuf::config::SpillbufConfig;
//!
//! // SPILLBUF_BUFFER__MEMORY_CAPACITY=8192 overrides buffer.memory_capacity
//! let config = SpillbufConfig::load()?;
//! config.validate()?;
//! println!("memory tier: {} bytes", config.buffer.memory_capacity);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data::coordinator::ReadTimeout;
use crate::error::BufferError;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/spillbuf.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SPILLBUF_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpillbufConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Buffer tier settings
    pub buffer: BufferSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

/// Which persistent segment implementation backs the spill tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Plain file accessed with seek + read/write
    #[default]
    File,
    /// Memory-mapped file
    Mmap,
}

/// Buffer tier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Memory tier capacity in bytes
    pub memory_capacity: usize,
    /// Backing tier capacity in bytes
    pub backing_capacity: usize,
    /// Location of the backing segment file
    pub segment_path: PathBuf,
    /// Backing segment implementation
    pub segment_kind: SegmentKind,
    /// Read timeout in milliseconds (0 = don't wait, absent = wait forever)
    pub read_timeout_ms: Option<u64>,
    /// Size of each producer write / consumer read in bytes
    pub chunk_size: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "spillbuf".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            memory_capacity: 64 * 1024,
            backing_capacity: 16 * 1024 * 1024,
            segment_path: PathBuf::from("spillbuf.seg"),
            segment_kind: SegmentKind::File,
            read_timeout_ms: None,
            chunk_size: 4096,
        }
    }
}

impl BufferSettings {
    /// Read timeout as the coordinator understands it.
    pub fn read_timeout(&self) -> ReadTimeout {
        ReadTimeout::from(self.read_timeout_ms.map(Duration::from_millis))
    }
}

impl SpillbufConfig {
    /// Load configuration from `config/spillbuf.toml` and environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// The provider stack used by [`load_from`](Self::load_from).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(SpillbufConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading.
    ///
    /// # Errors
    /// [`BufferError::Configuration`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), BufferError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level = self.application.log_level.to_lowercase();
        if !valid_levels.contains(&level.as_str()) {
            return Err(BufferError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(BufferError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.buffer.memory_capacity == 0 {
            return Err(BufferError::Configuration(
                "buffer.memory_capacity must be > 0".to_string(),
            ));
        }

        if self.buffer.backing_capacity == 0 {
            return Err(BufferError::Configuration(
                "buffer.backing_capacity must be > 0".to_string(),
            ));
        }

        if self.buffer.chunk_size == 0 {
            return Err(BufferError::Configuration(
                "buffer.chunk_size must be > 0".to_string(),
            ));
        }

        // a full-chunk read must be satisfiable or a reader waiting forever never wakes
        let total = self
            .buffer
            .memory_capacity
            .saturating_add(self.buffer.backing_capacity);
        if self.buffer.chunk_size > total {
            return Err(BufferError::Configuration(format!(
                "buffer.chunk_size ({}) exceeds memory_capacity + backing_capacity ({})",
                self.buffer.chunk_size, total
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = SpillbufConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer.read_timeout(), ReadTimeout::Forever);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let config = SpillbufConfig::load_from("does/not/exist.toml")?;
            assert_eq!(config, SpillbufConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "spillbuf.toml",
                r#"
                [application]
                log_level = "debug"

                [buffer]
                memory_capacity = 128
                backing_capacity = 1024
                segment_kind = "mmap"
                read_timeout_ms = 250
                "#,
            )?;

            let config = SpillbufConfig::load_from("spillbuf.toml")?;
            assert_eq!(config.application.log_level, "debug");
            assert_eq!(config.application.name, "spillbuf");
            assert_eq!(config.buffer.memory_capacity, 128);
            assert_eq!(config.buffer.backing_capacity, 1024);
            assert_eq!(config.buffer.segment_kind, SegmentKind::Mmap);
            assert_eq!(
                config.buffer.read_timeout(),
                ReadTimeout::Bounded(Duration::from_millis(250))
            );
            assert_eq!(config.buffer.chunk_size, 4096);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("spillbuf.toml", "[buffer]\nmemory_capacity = 128\n")?;
            jail.set_env("SPILLBUF_BUFFER__MEMORY_CAPACITY", "512");
            jail.set_env("SPILLBUF_BUFFER__READ_TIMEOUT_MS", "0");

            let config = SpillbufConfig::load_from("spillbuf.toml")?;
            assert_eq!(config.buffer.memory_capacity, 512);
            assert_eq!(config.buffer.read_timeout(), ReadTimeout::NoWait);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = SpillbufConfig::default();
        config.application.log_level = "invalid".to_string();
        assert!(matches!(
            config.validate(),
            Err(BufferError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = SpillbufConfig::default();
        config.application.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacities_rejected() {
        let mut config = SpillbufConfig::default();
        config.buffer.memory_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = SpillbufConfig::default();
        config.buffer.backing_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = SpillbufConfig::default();
        config.buffer.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_larger_than_both_tiers_rejected() {
        let mut config = SpillbufConfig::default();
        config.buffer.memory_capacity = 1024;
        config.buffer.backing_capacity = 1024;
        config.buffer.chunk_size = 4096;
        assert!(matches!(
            config.validate(),
            Err(BufferError::Configuration(msg)) if msg.contains("chunk_size")
        ));

        config.buffer.chunk_size = 2048;
        assert!(config.validate().is_ok());
    }
}
