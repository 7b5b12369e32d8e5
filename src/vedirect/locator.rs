//! # VE.Direct Block Locator
//!
//! Finds the most recent complete block inside a raw serial capture.
//!
//! The controller streams blocks back to back, so a capture window usually
//! starts in the middle of one block and ends in the middle of another. The
//! block of interest is the newest one whose `PID` start and `Checksum` end
//! both lie inside the capture.

use super::protocol::{END_MARKER, MAX_BLOCK_SIZE, START_MARKER};
use crate::error::ProtocolError;
use tracing::debug;

/// A located block, borrowed from the capture it was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Offset of the start marker in the capture
    pub start: usize,
    /// Offset of the end marker in the capture
    pub end: usize,
    /// Block bytes from the start marker through the checksum byte,
    /// bounded to `MAX_BLOCK_SIZE`
    pub bytes: &'a [u8],
    /// Raw checksum byte, if the capture contains it
    pub checksum: Option<u8>,
}

impl<'a> Frame<'a> {
    /// Whether `bytes` holds the whole block including its checksum byte
    pub fn is_complete(&self) -> bool {
        self.checksum.is_some() && self.bytes.len() == self.end - self.start + END_MARKER.len() + 1
    }
}

/// Offset of the last occurrence of `needle` in `haystack`
fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

/// Locate the start and end marker offsets of the latest complete block
///
/// # Arguments
///
/// * `buffer` - Raw capture bytes
///
/// # Returns
///
/// * `Result<(usize, usize), ProtocolError>` - (start marker offset, end marker offset)
///
/// # Errors
///
/// Returns error if:
/// - Either marker is missing, also after wraparound correction (`NoFrame`)
/// - The start marker does not precede the end marker (`Malformed`)
pub fn locate(buffer: &[u8]) -> Result<(usize, usize), ProtocolError> {
    let end = rfind(buffer, END_MARKER).ok_or(ProtocolError::NoFrame)?;
    let mut start = rfind(buffer, START_MARKER).ok_or(ProtocolError::NoFrame)?;

    if end < start {
        // The newest block is still being transmitted; fall back to the one
        // that ends at `end`, cutting right after its checksum byte.
        debug!("End position [{}] comes before start [{}]", end, start);
        let cut = (end + END_MARKER.len() + 1).min(buffer.len());
        start = rfind(&buffer[..cut], START_MARKER).ok_or(ProtocolError::NoFrame)?;
    }

    if start >= end {
        return Err(ProtocolError::Malformed { start, end });
    }

    if start == 0 {
        debug!("Polling caught transmission start");
    }
    if end + END_MARKER.len() + 1 == buffer.len() {
        debug!("Polling finished at transmission end");
    }
    debug!("Located block: start [{}], end [{}]", start, end);

    Ok((start, end))
}

/// Locate the latest complete block and borrow it from the capture
///
/// # Arguments
///
/// * `buffer` - Raw capture bytes
///
/// # Returns
///
/// * `Result<Frame, ProtocolError>` - Block slice bounded to 256 bytes
///
/// # Examples
///
/// ```
/// use vedirect_capture::vedirect::locator::extract_frame;
///
/// let capture = b"\r\nPID\t0xA053\r\nV\t12800\r\nChecksum\t\x42\r\nPID\t0xA0";
/// let frame = extract_frame(capture).unwrap();
/// assert!(frame.bytes.starts_with(b"PID\t0xA053"));
/// assert_eq!(frame.checksum, Some(0x42));
/// ```
pub fn extract_frame(buffer: &[u8]) -> Result<Frame<'_>, ProtocolError> {
    let (start, end) = locate(buffer)?;

    let checksum_pos = end + END_MARKER.len();
    let block_end = (checksum_pos + 1).min(buffer.len()).min(start + MAX_BLOCK_SIZE);

    Ok(Frame {
        start,
        end,
        bytes: &buffer[start..block_end],
        checksum: buffer.get(checksum_pos).copied(),
    })
}
