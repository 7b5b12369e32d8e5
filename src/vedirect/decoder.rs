//! # VE.Direct Field Decoder
//!
//! Splits a located block into `(code, value)` pairs.
//!
//! Two-state scanner: bytes accumulate into the key until a TAB, then into the
//! value until a CR. LF carries no information and is skipped. A NUL byte or
//! the end of the block stops the scan, emitting a value still in progress.

use super::protocol::{FieldCode, CR, LF, MAX_FIELD_LEN, NUL, TAB};
use tracing::{debug, trace, warn};

/// Scanner position inside a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Key,
    Value,
}

/// Known fields of one block, in decode order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Known field codes with their raw values, last write wins
    pub fields: Vec<(FieldCode, String)>,
    /// Unknown field codes seen and skipped
    pub unknown: Vec<String>,
}

impl DecodedBlock {
    /// Raw value of a field, if decoded
    pub fn get(&self, code: FieldCode) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == code)
            .map(|(_, value)| value.as_str())
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) {
        let key = String::from_utf8_lossy(key);
        let value = String::from_utf8_lossy(value).into_owned();
        debug!("key [{}] value [{}]", key, value);

        let Some(code) = FieldCode::from_code(&key) else {
            warn!("Decode warning: unknown field code [{}]", key);
            self.unknown.push(key.into_owned());
            return;
        };

        match self.fields.iter_mut().find(|(field, _)| *field == code) {
            Some(slot) => {
                debug!("Field [{}] repeated in block, keeping last value", code);
                slot.1 = value;
            }
            None => self.fields.push((code, value)),
        }
    }
}

/// Append a byte unless the field is already at its maximum length
fn push_bounded(buffer: &mut Vec<u8>, byte: u8) {
    if buffer.len() < MAX_FIELD_LEN {
        buffer.push(byte);
    }
}

/// Decode a block into its known fields
///
/// # Arguments
///
/// * `block` - Block bytes, normally starting at the `PID` marker
///
/// # Returns
///
/// * `DecodedBlock` - Known fields in decode order plus skipped unknown codes
///
/// # Examples
///
/// ```
/// use vedirect_capture::vedirect::decoder::decode;
/// use vedirect_capture::vedirect::protocol::FieldCode;
///
/// let block = decode(b"PID\t0xA053\r\nV\t12800\r\nCS\t3\r\n");
/// assert_eq!(block.get(FieldCode::BatteryVoltage), Some("12800"));
/// assert_eq!(block.fields.len(), 3);
/// ```
pub fn decode(block: &[u8]) -> DecodedBlock {
    let mut decoded = DecodedBlock::default();
    let mut state = ScanState::Key;
    let mut key: Vec<u8> = Vec::with_capacity(16);
    let mut value: Vec<u8> = Vec::with_capacity(32);

    for &byte in block {
        match (state, byte) {
            (ScanState::Value, NUL) => {
                decoded.insert(&key, &value);
                return decoded;
            }
            (ScanState::Key, NUL) => return decoded,
            (_, LF) => continue,
            (ScanState::Key, TAB) => state = ScanState::Value,
            (ScanState::Key, CR) => {
                // Empty or broken line without a value
                if !key.is_empty() {
                    trace!("Dropping line without value: {:?}", String::from_utf8_lossy(&key));
                }
                key.clear();
            }
            (ScanState::Value, CR) => {
                decoded.insert(&key, &value);
                key.clear();
                value.clear();
                state = ScanState::Key;
            }
            (ScanState::Key, _) => push_bounded(&mut key, byte),
            (ScanState::Value, _) => push_bounded(&mut value, byte),
        }
    }

    if state == ScanState::Value {
        decoded.insert(&key, &value);
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_typical_block() {
        let block = b"PID\t0xA053\r\nFW\t159\r\nSER#\tHQ1828ABCDE\r\nV\t12800\r\nI\t-350\r\n\
VPV\t35120\r\nPPV\t42\r\nCS\t3\r\nERR\t0\r\nLOAD\tON\r\nIL\t300\r\nH19\t1234\r\n\
H20\t5\r\nH21\t120\r\nH22\t7\r\nH23\t150\r\nHSDS\t42\r\nChecksum\t\x9C";

        let decoded = decode(block);
        assert!(decoded.unknown.is_empty());
        assert_eq!(decoded.fields.len(), 18);
        assert_eq!(decoded.fields[0], (FieldCode::ProductId, "0xA053".to_string()));
        assert_eq!(decoded.get(FieldCode::SerialNumber), Some("HQ1828ABCDE"));
        assert_eq!(decoded.get(FieldCode::BatteryCurrent), Some("-350"));
        assert_eq!(decoded.get(FieldCode::LoadState), Some("ON"));
        assert_eq!(decoded.get(FieldCode::DaySequence), Some("42"));
        // Checksum value runs to the end of the block
        assert_eq!(decoded.get(FieldCode::Checksum), Some("\u{FFFD}"));
        assert_eq!(decoded.get(FieldCode::RelayState), None);
    }

    #[test]
    fn test_unknown_code_between_known_codes() {
        let decoded = decode(b"V\t12560\r\nMPPT\t2\r\nVPV\t35000\r\n");

        assert_eq!(decoded.get(FieldCode::BatteryVoltage), Some("12560"));
        assert_eq!(decoded.get(FieldCode::PanelVoltage), Some("35000"));
        assert_eq!(decoded.fields.len(), 2);
        assert_eq!(decoded.unknown, vec!["MPPT".to_string()]);
    }

    #[test]
    fn test_repeated_key_last_write_wins() {
        let decoded = decode(b"V\t12000\r\nI\t100\r\nV\t12500\r\n");
        assert_eq!(
            decoded.fields,
            vec![
                (FieldCode::BatteryVoltage, "12500".to_string()),
                (FieldCode::BatteryCurrent, "100".to_string()),
            ]
        );
    }

    #[test]
    fn test_bare_lf_is_ignored() {
        let decoded = decode(b"\nV\t12\n560\r\nI\t1\n0\r\n");
        assert_eq!(decoded.get(FieldCode::BatteryVoltage), Some("12560"));
        assert_eq!(decoded.get(FieldCode::BatteryCurrent), Some("10"));
    }

    #[test]
    fn test_nul_ends_decoding_and_emits_pending_value() {
        let decoded = decode(b"V\t12560\r\nFW\t130\0I\t100\r\n");
        assert_eq!(decoded.get(FieldCode::FirmwareVersion), Some("130"));
        assert_eq!(decoded.get(FieldCode::BatteryCurrent), None);
    }

    #[test]
    fn test_nul_in_key_state_stops_without_emitting() {
        let decoded = decode(b"V\t12560\r\nF\0W\t130\r\n");
        assert_eq!(decoded.fields.len(), 1);
        assert!(decoded.unknown.is_empty());
    }

    #[test]
    fn test_value_pending_at_end_of_block_is_emitted() {
        let decoded = decode(b"V\t12560\r\nChecksum\t\x33");
        assert_eq!(decoded.get(FieldCode::Checksum), Some("3"));
    }

    #[test]
    fn test_empty_value_and_empty_lines() {
        let decoded = decode(b"\r\n\r\nSER#\t\r\nV\t1\r\n");
        assert_eq!(decoded.get(FieldCode::SerialNumber), Some(""));
        assert_eq!(decoded.get(FieldCode::BatteryVoltage), Some("1"));
        assert!(decoded.unknown.is_empty());
    }

    #[test]
    fn test_tab_inside_value_is_kept() {
        let decoded = decode(b"Checksum\t\t");
        assert_eq!(decoded.get(FieldCode::Checksum), Some("\t"));
    }

    #[test]
    fn test_overlong_value_is_bounded() {
        let mut block = b"SER#\t".to_vec();
        block.extend(std::iter::repeat(b'A').take(400));
        block.extend_from_slice(b"\r\n");

        let decoded = decode(&block);
        assert_eq!(decoded.get(FieldCode::SerialNumber).map(str::len), Some(MAX_FIELD_LEN));
    }

    #[test]
    fn test_empty_block() {
        assert_eq!(decode(b""), DecodedBlock::default());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let block = b"PID\t0xA050\r\nV\t12560\r\nX\t1\r\nCS\t5\r\nChecksum\t\x01";
        assert_eq!(decode(block), decode(block));
    }
}
