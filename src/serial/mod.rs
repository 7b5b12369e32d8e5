//! # Serial Communication Module
//!
//! Handles the serial link to the charge controller's VE.Direct port.
//!
//! This module handles:
//! - Opening the serial device at 19,200 baud, 8N1, no flow control
//! - Rejecting devices that are not serial terminals
//! - One bounded capture: a single timed read of up to 512 bytes
//!
//! The port is owned by `SerialSession` and closed when the session is
//! dropped, so every exit path of a capture cycle releases it.

pub mod port_trait;

use crate::config::SerialConfig;
use crate::error::{CaptureError, Result};
use crate::vedirect::protocol::VEDIRECT_BAUD_RATE;
use bytes::Bytes;
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

pub use port_trait::CaptureSource;

/// Hard capacity of one raw capture in bytes
pub const CAPTURE_CAPACITY: usize = 512;

/// Default wait for data before a capture times out
pub const POLL_TIMEOUT_MS: u64 = 2000;

/// Captures shorter than this cannot hold a complete block
pub const MIN_CAPTURE_BYTES: usize = 100;

/// Default serial device (Raspberry Pi primary UART)
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyAMA0";

/// Bytes returned by one capture
///
/// Never mutated after capture and never larger than `CAPTURE_CAPACITY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    bytes: Bytes,
}

impl RawCapture {
    /// Wrap captured bytes, discarding anything beyond the capture capacity
    pub fn new(data: impl Into<Bytes>) -> Self {
        let mut bytes = data.into();
        bytes.truncate(CAPTURE_CAPACITY);
        Self { bytes }
    }

    /// Captured bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of captured bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Captured bytes, provided there are at least `required` of them
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` for short captures: the controller sends a
    /// full block every second, so a short read means a broken link.
    pub fn require(&self, required: usize) -> std::result::Result<&[u8], CaptureError> {
        if self.len() < required {
            return Err(CaptureError::InsufficientData {
                received: self.len(),
                required,
            });
        }
        Ok(self.as_bytes())
    }
}

impl From<Vec<u8>> for RawCapture {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for RawCapture {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

/// VE.Direct serial session
///
/// Owns the open port of one capture cycle.
pub struct SerialSession {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyAMA0)
    device_path: String,
    /// Wait for readability before giving up
    poll_timeout: Duration,
}

impl std::fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSession")
            .field("device_path", &self.device_path)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialSession {
    /// Open a VE.Direct session with the default poll timeout
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    ///
    /// # Errors
    ///
    /// Returns error if the device is missing, is not a TTY, or cannot be
    /// configured
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vedirect_capture::serial::SerialSession;
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut session = SerialSession::open("/dev/ttyUSB0")?;
    ///     let capture = session.capture().await?;
    ///     println!("{} bytes", capture.len());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_timeout(path, VEDIRECT_BAUD_RATE, POLL_TIMEOUT_MS)
    }

    /// Open a session using the `[serial]` configuration section
    pub fn open_with_config(config: &SerialConfig) -> Result<Self> {
        Self::open_with_timeout(&config.port, config.baud_rate, config.timeout_ms)
    }

    fn open_with_timeout(path: &str, baud_rate: u32, timeout_ms: u64) -> Result<Self> {
        debug!("Opening serial port: {}", path);
        check_tty(path)?;

        let port = Self::open_port(path, baud_rate, timeout_ms)?;
        info!("Opened VE.Direct device at {} ({} baud)", path, baud_rate);

        Ok(Self {
            port,
            device_path: path.to_string(),
            poll_timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Open a specific serial port with VE.Direct settings
    ///
    /// The native port is opened non-blocking without becoming the
    /// controlling terminal, and put in raw mode: no echo, no CR/NL
    /// translation, no signal characters.
    fn open_port(path: &str, baud_rate: u32, timeout_ms: u64) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(timeout_ms))
            .open_native_async()
            .map_err(|e| CaptureError::Open {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok(port)
    }

    /// Capture one buffer of raw bytes
    ///
    /// Waits for the port to become readable, bounded by the poll timeout,
    /// then performs a single read of at most `CAPTURE_CAPACITY` bytes.
    /// There is no accumulation across reads.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if nothing arrived in time, `Read` if the read fails
    pub async fn capture(&mut self) -> Result<RawCapture> {
        use tokio::io::AsyncReadExt;

        let mut buffer = vec![0u8; CAPTURE_CAPACITY];
        let count = match tokio::time::timeout(self.poll_timeout, self.port.read(&mut buffer)).await {
            Ok(result) => result.map_err(CaptureError::Read)?,
            Err(_) => {
                return Err(CaptureError::Timeout(self.poll_timeout.as_millis() as u64).into());
            }
        };

        buffer.truncate(count);
        debug!("Received serial line data [{}] bytes", count);

        Ok(RawCapture::from(buffer))
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

/// Reject paths that do not name a serial terminal
///
/// Missing paths fail with `Open`. Regular files, directories and character
/// devices without terminal attributes (e.g. /dev/null) fail with `NotATty`.
#[cfg(unix)]
fn check_tty(path: &str) -> std::result::Result<(), CaptureError> {
    use nix::fcntl::{open, OFlag};
    use nix::sys::stat::Mode;
    use nix::unistd::{close, isatty};
    use std::os::unix::fs::FileTypeExt;

    let open_error = |reason: String| CaptureError::Open {
        path: path.to_string(),
        reason,
    };

    let metadata = std::fs::metadata(path).map_err(|e| open_error(e.to_string()))?;
    if !metadata.file_type().is_char_device() {
        return Err(CaptureError::NotATty(path.to_string()));
    }

    // Non-blocking so a modem line without carrier does not hang the open
    let fd = open(path, OFlag::O_RDONLY | OFlag::O_NOCTTY | OFlag::O_NONBLOCK, Mode::empty())
        .map_err(|e| open_error(e.desc().to_string()))?;
    let terminal = isatty(fd);
    let _ = close(fd);

    match terminal {
        Ok(true) => Ok(()),
        Ok(false) => Err(CaptureError::NotATty(path.to_string())),
        Err(e) => Err(open_error(e.desc().to_string())),
    }
}

#[cfg(not(unix))]
fn check_tty(_path: &str) -> std::result::Result<(), CaptureError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VeDirectError;

    #[test]
    fn test_constants() {
        assert_eq!(VEDIRECT_BAUD_RATE, 19_200);
        assert_eq!(CAPTURE_CAPACITY, 512);
        assert_eq!(POLL_TIMEOUT_MS, 2000);
        assert_eq!(MIN_CAPTURE_BYTES, 100);
        assert_eq!(DEFAULT_DEVICE_PATH, "/dev/ttyAMA0");
    }

    #[test]
    fn test_raw_capture_is_bounded() {
        let capture = RawCapture::from(vec![b'x'; 700]);
        assert_eq!(capture.len(), CAPTURE_CAPACITY);
    }

    #[test]
    fn test_require_rejects_short_capture() {
        let capture = RawCapture::from(vec![b'x'; 99]);
        match capture.require(MIN_CAPTURE_BYTES) {
            Err(CaptureError::InsufficientData { received, required }) => {
                assert_eq!(received, 99);
                assert_eq!(required, 100);
            }
            other => panic!("Expected InsufficientData, got: {:?}", other),
        }
    }

    #[test]
    fn test_require_accepts_exact_minimum() {
        let capture = RawCapture::from(vec![b'x'; 100]);
        assert_eq!(capture.require(MIN_CAPTURE_BYTES).unwrap().len(), 100);
    }

    #[test]
    fn test_empty_capture() {
        let capture = RawCapture::from(Vec::new());
        assert!(capture.is_empty());
        assert!(capture.require(1).is_err());
    }

    #[test]
    fn test_open_nonexistent_device_returns_open_error() {
        let result = SerialSession::open("/dev/nonexistent_serial_device_12345");

        match result.unwrap_err() {
            VeDirectError::Capture(CaptureError::Open { path, .. }) => {
                assert_eq!(path, "/dev/nonexistent_serial_device_12345");
            }
            other => panic!("Expected Open error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_regular_file_returns_not_a_tty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        match SerialSession::open(&path).unwrap_err() {
            VeDirectError::Capture(CaptureError::NotATty(p)) => assert_eq!(p, path),
            other => panic!("Expected NotATty error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_directory_returns_not_a_tty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        assert!(matches!(
            SerialSession::open(path),
            Err(VeDirectError::Capture(CaptureError::NotATty(_)))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_open_non_terminal_char_device_returns_not_a_tty() {
        match SerialSession::open("/dev/null").unwrap_err() {
            VeDirectError::Capture(CaptureError::NotATty(p)) => assert_eq!(p, "/dev/null"),
            other => panic!("Expected NotATty error, got: {:?}", other),
        }
    }

    // Integration test - only runs if a charge controller is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_capture_with_real_hardware() {
        let result = SerialSession::open(DEFAULT_DEVICE_PATH);

        if let Ok(mut session) = result {
            let capture = session.capture().await;
            assert!(capture.is_ok(), "Capture failed: {:?}", capture);
            println!("Captured {} bytes", capture.unwrap().len());
        } else {
            println!("No VE.Direct hardware detected (skipping capture test)");
        }
    }
}
