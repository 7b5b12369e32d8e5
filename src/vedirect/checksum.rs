//! # VE.Direct Block Checksum
//!
//! The last byte of a block is chosen so that the modulo-256 sum of every
//! byte transmitted in the block is zero. The sum covers the CR LF that
//! precedes the `PID` line, all lines, and the checksum byte itself.
//!
//! Validation is opt-in. Captures are accepted without it by default.

use super::locator::Frame;
use super::protocol::{CR, LF};
use crate::error::ProtocolError;

/// Modulo-256 sum of a byte slice
pub fn block_sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Checksum byte to append to `block` so the whole block sums to zero
///
/// # Arguments
///
/// * `block` - Block bytes as transmitted, starting with the leading CR LF and
///   ending with the TAB after `Checksum`
///
/// # Examples
///
/// ```
/// use vedirect_capture::vedirect::checksum::{block_sum, checksum_byte};
///
/// let mut block = b"\r\nPID\t0xA053\r\nChecksum\t".to_vec();
/// block.push(checksum_byte(&block));
/// assert_eq!(block_sum(&block), 0);
/// ```
pub fn checksum_byte(block: &[u8]) -> u8 {
    block_sum(block).wrapping_neg()
}

/// Validate the checksum of a located frame
///
/// The frame starts at the `PID` marker, so the CR LF that precedes it on the
/// wire is added back before summing.
///
/// # Errors
///
/// Returns `ChecksumMismatch` if the sum is not zero, which includes frames
/// whose checksum byte was not captured or that were cut at the block size
/// bound.
pub fn verify_frame(frame: &Frame<'_>) -> Result<(), ProtocolError> {
    let sum = block_sum(frame.bytes).wrapping_add(CR).wrapping_add(LF);

    if !frame.is_complete() || sum != 0 {
        return Err(ProtocolError::ChecksumMismatch { sum });
    }

    Ok(())
}
