//! # Telemetry Module
//!
//! Runs capture cycles against a charge controller and hands out records.
//!
//! This module handles:
//! - One capture cycle: capture, guard, locate, verify, decode, build
//! - Opening and releasing the serial session around a single cycle
//! - Timestamped samples serialized as JSON lines for report formatters
//! - Repeated capture cycles (see `poller`)

pub mod poller;

use crate::config::Config;
use crate::error::Result;
use crate::serial::{CaptureSource, SerialSession, MIN_CAPTURE_BYTES};
use crate::vedirect::checksum::verify_frame;
use crate::vedirect::decoder::decode;
use crate::vedirect::locator::extract_frame;
use crate::vedirect::record::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

pub use poller::{PollStats, Poller};

/// Per-cycle decoding options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject blocks whose modulo-256 sum is not zero
    pub validate_checksum: bool,
    /// Shortest capture accepted for decoding
    pub min_capture_bytes: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            validate_checksum: false,
            min_capture_bytes: MIN_CAPTURE_BYTES,
        }
    }
}

impl From<&Config> for DecodeOptions {
    fn from(config: &Config) -> Self {
        Self {
            validate_checksum: config.decoder.validate_checksum,
            min_capture_bytes: config.serial.min_capture_bytes,
        }
    }
}

/// Decode the latest complete block of a capture into a record
///
/// Pure and hardware free: the same bytes always give the same record.
///
/// # Errors
///
/// Returns a protocol error if no block can be located, or if checksum
/// validation is enabled and the block fails it
///
/// # Examples
///
/// ```
/// use vedirect_capture::telemetry::{decode_capture, DecodeOptions};
/// use vedirect_capture::vedirect::protocol::FieldCode;
///
/// let capture = b"\r\nPID\t0xA053\r\nV\t13210\r\nCS\t3\r\nChecksum\t\x00";
/// let record = decode_capture(capture, &DecodeOptions::default())?;
/// assert_eq!(record.quantity(FieldCode::BatteryVoltage), Some(13.21));
/// # Ok::<(), vedirect_capture::error::VeDirectError>(())
/// ```
pub fn decode_capture(bytes: &[u8], options: &DecodeOptions) -> Result<Record> {
    let frame = extract_frame(bytes)?;
    debug!(
        "Block at [{}..{}]: {}",
        frame.start,
        frame.end,
        String::from_utf8_lossy(frame.bytes).escape_debug()
    );

    if options.validate_checksum {
        verify_frame(&frame)?;
    }

    let decoded = decode(frame.bytes);
    if !decoded.unknown.is_empty() {
        debug!("Skipped {} unknown field(s)", decoded.unknown.len());
    }

    Ok(Record::from_decoded(&decoded))
}

/// Run one capture cycle against a capture source
///
/// # Errors
///
/// Returns a capture error if the source fails or delivers fewer than
/// `min_capture_bytes`, otherwise any error of `decode_capture`
pub async fn read_record<S>(source: &mut S, options: &DecodeOptions) -> Result<Record>
where
    S: CaptureSource + ?Sized,
{
    let capture = source.capture().await?;
    let bytes = capture.require(options.min_capture_bytes)?;
    decode_capture(bytes, options)
}

/// Open the configured device, run one capture cycle and close the device
///
/// The session is dropped before returning, on success and on every error.
pub async fn capture_once(config: &Config) -> Result<Sample> {
    let options = DecodeOptions::from(config);
    let mut session = SerialSession::open_with_config(&config.serial)?;

    let result = read_record(&mut session, &options).await;
    drop(session);

    match result {
        Ok(record) => Ok(Sample::new(&config.serial.port, record)),
        Err(e) => {
            warn!("Capture cycle on {} failed: {}", config.serial.port, e);
            Err(e)
        }
    }
}

/// One timestamped record, as emitted to report formatters
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub device: String,
    pub record: Record,
}

impl Sample {
    /// Stamp a record with the current UTC time
    pub fn new(device: &str, record: Record) -> Self {
        Self {
            timestamp: Utc::now(),
            device: device.to_string(),
            record,
        }
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::vedirect::checksum::checksum_byte;

    /// A capture window as a controller produces it: the tail of one block,
    /// one whole sealed block, and the head of the next
    pub fn capture_window() -> Vec<u8> {
        let mut block = b"\r\nPID\t0xA053\r\nFW\t159\r\nSER#\tHQ2132QY2KR\r\nV\t13210\r\n\
I\t2400\r\nVPV\t35120\r\nPPV\t34\r\nCS\t3\r\nMPPT\t2\r\nOR\t0x00000000\r\nERR\t0\r\n\
LOAD\tON\r\nIL\t300\r\nH19\t1234\r\nH20\t12\r\nH21\t156\r\nH22\t10\r\nH23\t140\r\n\
HSDS\t42\r\nChecksum\t"
            .to_vec();
        block.push(checksum_byte(&block));

        let mut capture = b"H22\t9\r\nH23\t130\r\nHSDS\t41\r\nChecksum\t\x8A".to_vec();
        capture.extend_from_slice(&block);
        capture.extend_from_slice(b"\r\nPID\t0xA053\r\nFW\t15");
        capture
    }
}
