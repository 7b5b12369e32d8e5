//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working single-shot configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, VeDirectError};
use crate::serial::{CAPTURE_CAPACITY, DEFAULT_DEVICE_PATH, MIN_CAPTURE_BYTES, POLL_TIMEOUT_MS};
use crate::vedirect::protocol::VEDIRECT_BAUD_RATE;

/// Shortest accepted device path, e.g. "/dev/tty"
const MIN_DEVICE_PATH_LEN: usize = 8;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub decoder: DecoderConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_min_capture_bytes")]
    pub min_capture_bytes: usize,
}

/// Block decoding configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DecoderConfig {
    #[serde(default)]
    pub validate_checksum: bool,
}

/// Repeated capture configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PollConfig {
    /// Milliseconds between capture cycles; 0 captures once and exits
    #[serde(default)]
    pub interval_ms: u64,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; empty disables file logging
    #[serde(default)]
    pub directory: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            min_capture_bytes: default_min_capture_bytes(),
        }
    }
}

// Default value functions
fn default_serial_port() -> String { DEFAULT_DEVICE_PATH.to_string() }
fn default_baud_rate() -> u32 { VEDIRECT_BAUD_RATE }
fn default_timeout_ms() -> u64 { POLL_TIMEOUT_MS }
fn default_min_capture_bytes() -> usize { MIN_CAPTURE_BYTES }

fn invalid(message: impl std::fmt::Display) -> VeDirectError {
    VeDirectError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vedirect_capture::config::Config;
    ///
    /// let config = Config::load("config/vedirect.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Called by `load`, and again after command line overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if self.serial.port.len() < MIN_DEVICE_PATH_LEN {
            return Err(invalid(format!(
                "serial port '{}' is not a valid device path",
                self.serial.port
            )));
        }

        if self.serial.baud_rate != VEDIRECT_BAUD_RATE {
            return Err(invalid(format!(
                "baud_rate must be {} (VE.Direct text mode)",
                VEDIRECT_BAUD_RATE
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.min_capture_bytes == 0 || self.serial.min_capture_bytes > CAPTURE_CAPACITY {
            return Err(invalid(format!(
                "min_capture_bytes must be between 1 and {}",
                CAPTURE_CAPACITY
            )));
        }

        // The controller sends one block per second
        if self.poll.interval_ms != 0 && !(1000..=86_400_000).contains(&self.poll.interval_ms) {
            return Err(invalid("interval_ms must be 0 or between 1000 and 86400000"));
        }

        Ok(())
    }

    /// Whether the configuration asks for repeated captures
    pub fn is_polling(&self) -> bool {
        self.poll.interval_ms > 0
    }

    /// Log directory, if file logging is enabled
    pub fn log_directory(&self) -> Option<&str> {
        Some(self.logging.directory.as_str()).filter(|dir| !dir.is_empty())
    }
}
