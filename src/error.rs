//! # Error Types
//!
//! Custom error types for VE.Direct capture using `thiserror`.
//!
//! Capture and protocol failures abort a capture cycle. Unknown field codes and
//! unmapped enumeration values are not errors: the decoder logs them and the
//! normalizer substitutes a sentinel label.

use thiserror::Error;

/// Serial capture failures
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Device could not be opened or configured
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// Device exists but is not a serial terminal
    #[error("{0} is not a TTY device")]
    NotATty(String),

    /// No data arrived within the poll timeout
    #[error("no serial data within {0} ms")]
    Timeout(u64),

    /// Too few bytes to hold a complete block
    #[error("received {received} bytes, need at least {required}")]
    InsufficientData { received: usize, required: usize },

    /// Read on an open port failed
    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),
}

/// Block synchronization failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Start or end marker missing from the capture
    #[error("no complete VE.Direct block in capture")]
    NoFrame,

    /// Start marker does not precede the end marker
    #[error("malformed block: start offset {start} not before end offset {end}")]
    Malformed { start: usize, end: usize },

    /// Opt-in checksum validation failed
    #[error("block checksum mismatch: byte sum is 0x{sum:02X}, expected 0x00")]
    ChecksumMismatch { sum: u8 },
}

/// Main error type for VE.Direct capture
#[derive(Debug, Error)]
pub enum VeDirectError {
    /// Serial capture errors
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    /// VE.Direct protocol errors
    #[error("VE.Direct protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Exit code for serial capture failures
pub const EXIT_CAPTURE_FAILURE: u8 = 255;

/// Exit code for captures without a usable block
pub const EXIT_PROTOCOL_FAILURE: u8 = 254;

/// Exit code for configuration and other failures
pub const EXIT_FAILURE: u8 = 253;

/// Highest exit code a successful capture may report
///
/// Success exits with the operational state code, so failure codes sit above
/// every state code a controller reports (0..=252).
pub const MAX_STATE_EXIT_CODE: u8 = 252;

impl VeDirectError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            VeDirectError::Capture(_) => EXIT_CAPTURE_FAILURE,
            VeDirectError::Protocol(_) => EXIT_PROTOCOL_FAILURE,
            _ => EXIT_FAILURE,
        }
    }
}

/// Result type alias for VE.Direct capture
pub type Result<T> = std::result::Result<T, VeDirectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinguish_failure_kinds() {
        let capture: VeDirectError = CaptureError::Timeout(2000).into();
        let protocol: VeDirectError = ProtocolError::NoFrame.into();
        let io: VeDirectError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();

        assert_eq!(capture.exit_code(), 255);
        assert_eq!(protocol.exit_code(), 254);
        assert_eq!(io.exit_code(), 253);
    }

    #[test]
    fn test_failure_codes_above_state_codes() {
        for code in [EXIT_CAPTURE_FAILURE, EXIT_PROTOCOL_FAILURE, EXIT_FAILURE] {
            assert!(code > MAX_STATE_EXIT_CODE);
        }
    }

    #[test]
    fn test_error_messages() {
        let err = CaptureError::InsufficientData { received: 42, required: 100 };
        assert_eq!(err.to_string(), "received 42 bytes, need at least 100");

        let err = ProtocolError::ChecksumMismatch { sum: 0x1F };
        assert!(err.to_string().contains("0x1F"));

        let err: VeDirectError = CaptureError::NotATty("/tmp/file".to_string()).into();
        assert_eq!(err.to_string(), "capture error: /tmp/file is not a TTY device");
    }
}
