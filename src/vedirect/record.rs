//! # VE.Direct Record
//!
//! The fixed-layout result of one capture cycle: one entry per known field
//! code, in catalog order. Codes not transmitted in the decoded block stay
//! `Absent`, so a consumer can tell "not sent" from "measured zero".

use super::decoder::DecodedBlock;
use super::normalizer::{normalize, NormalizedValue};
use super::protocol::{FieldCode, FIELD_SPECS};
use serde::Serialize;

/// State of one field in a record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FieldValue {
    /// Not transmitted in this block
    Absent,
    /// Transmitted, with raw and normalized value
    Present { raw: String, value: NormalizedValue },
}

impl FieldValue {
    /// Whether the field was transmitted
    pub fn is_present(&self) -> bool {
        matches!(self, FieldValue::Present { .. })
    }

    /// Raw value, if present
    pub fn raw(&self) -> Option<&str> {
        match self {
            FieldValue::Present { raw, .. } => Some(raw),
            FieldValue::Absent => None,
        }
    }

    /// Normalized value, if present
    pub fn value(&self) -> Option<&NormalizedValue> {
        match self {
            FieldValue::Present { value, .. } => Some(value),
            FieldValue::Absent => None,
        }
    }
}

/// One field of a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordEntry {
    pub code: FieldCode,
    pub label: &'static str,
    #[serde(flatten)]
    pub value: FieldValue,
}

/// All known fields of one block, in catalog order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<RecordEntry>,
}

impl Record {
    /// Build a record from a decoded block
    ///
    /// # Examples
    ///
    /// ```
    /// use vedirect_capture::vedirect::decoder::decode;
    /// use vedirect_capture::vedirect::protocol::FieldCode;
    /// use vedirect_capture::vedirect::record::Record;
    ///
    /// let record = Record::from_decoded(&decode(b"PID\t0xA050\r\nCS\t5\r\n"));
    /// assert_eq!(record.label(FieldCode::OperationalState), Some("Float"));
    /// assert!(!record.get(FieldCode::BatteryVoltage).is_present());
    /// ```
    pub fn from_decoded(decoded: &DecodedBlock) -> Self {
        let mut builder = RecordBuilder::new();
        for (code, raw) in &decoded.fields {
            builder.set(*code, raw);
        }
        builder.build()
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[RecordEntry] {
        &self.fields
    }

    /// Field state for a code
    pub fn get(&self, code: FieldCode) -> &FieldValue {
        // Entries are stored in catalog order, which is enum order
        &self.fields[code as usize].value
    }

    /// Numeric view of a present field (SI quantity, decimal, code or integer)
    pub fn quantity(&self, code: FieldCode) -> Option<f64> {
        self.get(code).value().map(NormalizedValue::as_f64)
    }

    /// Enumeration label of a present field
    pub fn label(&self, code: FieldCode) -> Option<&str> {
        self.get(code).value().and_then(NormalizedValue::label)
    }

    /// Numeric operational state (`CS`), if transmitted
    pub fn operational_state(&self) -> Option<i64> {
        match self.get(FieldCode::OperationalState).value() {
            Some(NormalizedValue::Enumerated { code, .. }) => Some(*code),
            _ => None,
        }
    }

    /// Battery charge (+) or discharge (-) power in W
    pub fn battery_power(&self) -> Option<f64> {
        Some(self.quantity(FieldCode::BatteryVoltage)? * self.quantity(FieldCode::BatteryCurrent)?)
    }

    /// Power drawn by the load output in W
    pub fn load_power(&self) -> Option<f64> {
        Some(self.quantity(FieldCode::BatteryVoltage)? * self.quantity(FieldCode::LoadCurrent)?)
    }

    /// Number of fields transmitted in this block
    pub fn present_count(&self) -> usize {
        self.fields.iter().filter(|entry| entry.value.is_present()).count()
    }
}

/// Assembles a `Record` field by field
///
/// Starts with every catalog code absent; each `set` normalizes a raw value.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    fields: Vec<RecordEntry>,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBuilder {
    /// Create a builder with every field absent
    pub fn new() -> Self {
        Self {
            fields: FIELD_SPECS
                .iter()
                .map(|spec| RecordEntry {
                    code: spec.code,
                    label: spec.label,
                    value: FieldValue::Absent,
                })
                .collect(),
        }
    }

    /// Normalize and store the raw value of a field, replacing any earlier value
    pub fn set(&mut self, code: FieldCode, raw: &str) -> &mut Self {
        self.fields[code as usize].value = FieldValue::Present {
            raw: raw.to_string(),
            value: normalize(code, raw),
        };
        self
    }

    /// Finish the record
    pub fn build(self) -> Record {
        Record { fields: self.fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vedirect::decoder::decode;
    use crate::vedirect::protocol::{Unit, FIELD_COUNT};

    const BLOCK: &[u8] = b"PID\t0xA050\r\nFW\t130\r\nSER#\tHQ1828ABCDE\r\nV\t12560\r\nI\t-500\r\n\
VPV\t0\r\nPPV\t0\r\nCS\t0\r\nERR\t0\r\nLOAD\tON\r\nIL\t1200\r\nH19\t45000\r\nH20\t0\r\n\
H21\t0\r\nH22\t12\r\nH23\t88\r\nHSDS\t17\r\nChecksum\t\x55";

    #[test]
    fn test_record_layout_follows_catalog() {
        let record = RecordBuilder::new().build();
        assert_eq!(record.entries().len(), FIELD_COUNT);
        for (entry, spec) in record.entries().iter().zip(FIELD_SPECS.iter()) {
            assert_eq!(entry.code, spec.code);
            assert_eq!(entry.label, spec.label);
            assert_eq!(entry.value, FieldValue::Absent);
        }
    }

    #[test]
    fn test_record_from_full_block() {
        let record = Record::from_decoded(&decode(BLOCK));

        assert_eq!(record.present_count(), 18);
        assert_eq!(record.label(FieldCode::ProductId), Some("SmartSolar MPPT 250/100"));
        assert_eq!(record.quantity(FieldCode::YieldTotal), Some(45_000_000.0));
        assert!((record.quantity(FieldCode::FirmwareVersion).unwrap() - 1.30).abs() < 1e-9);
        assert_eq!(record.get(FieldCode::SerialNumber).raw(), Some("HQ1828ABCDE"));
        assert_eq!(record.operational_state(), Some(0));
        assert_eq!(record.label(FieldCode::OperationalState), Some("Off"));
        assert_eq!(record.get(FieldCode::RelayState), &FieldValue::Absent);
    }

    #[test]
    fn test_absent_is_distinct_from_zero() {
        let record = Record::from_decoded(&decode(b"PPV\t0\r\n"));

        assert_eq!(record.quantity(FieldCode::PanelPower), Some(0.0));
        assert_eq!(record.quantity(FieldCode::BatteryVoltage), None);
        assert_eq!(record.operational_state(), None);
    }

    #[test]
    fn test_power_balance() {
        let record = Record::from_decoded(&decode(BLOCK));

        let battery = record.battery_power().unwrap();
        assert!((battery - 12.56 * -0.5).abs() < 1e-9);
        let load = record.load_power().unwrap();
        assert!((load - 12.56 * 1.2).abs() < 1e-9);

        let partial = Record::from_decoded(&decode(b"V\t12000\r\n"));
        assert_eq!(partial.battery_power(), None);
    }

    #[test]
    fn test_builder_set_overwrites() {
        let mut builder = RecordBuilder::new();
        builder.set(FieldCode::BatteryVoltage, "12000").set(FieldCode::BatteryVoltage, "13000");
        let record = builder.build();
        assert_eq!(
            record.get(FieldCode::BatteryVoltage).value(),
            Some(&NormalizedValue::Quantity { value: 13.0, unit: Unit::Volt })
        );
    }

    #[test]
    fn test_same_block_twice_yields_identical_records() {
        let first = Record::from_decoded(&decode(BLOCK));
        let second = Record::from_decoded(&decode(BLOCK));
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_json_shape() {
        let record = Record::from_decoded(&decode(b"V\t12560\r\n"));
        let json = serde_json::to_value(&record).unwrap();

        let first = &json["fields"][0];
        assert_eq!(first["code"], "V");
        assert_eq!(first["label"], "Battery Voltage");
        assert_eq!(first["state"], "present");
        assert_eq!(first["raw"], "12560");
        assert_eq!(first["value"]["unit"], "V");

        assert_eq!(json["fields"][1]["state"], "absent");
    }
}
