//! # VE.Direct Protocol Constants and Types
//!
//! Core protocol definitions for VE.Direct text-mode output of Victron
//! BlueSolar and SmartSolar MPPT charge controllers.
//!
//! The controller transmits one block per second. Each line of a block is
//! `CR LF <code> TAB <value>`; the block starts with the `PID` line and ends
//! with the `Checksum` line, whose value is a single raw byte.

use serde::{Serialize, Serializer};

/// Serial line speed of the text protocol
pub const VEDIRECT_BAUD_RATE: u32 = 19_200;

/// Field separator between code and value
pub const TAB: u8 = 0x09;

/// Line terminator, first half
pub const CR: u8 = 0x0D;

/// Line terminator, second half
pub const LF: u8 = 0x0A;

/// String terminator, ends decoding when seen inside a block
pub const NUL: u8 = 0x00;

/// Block start marker: "PID" followed by TAB
pub const START_MARKER: &[u8] = b"PID\t";

/// Block end marker: "Checksum" followed by TAB (the checksum byte follows)
pub const END_MARKER: &[u8] = b"Checksum\t";

/// Maximum block length handed to the field decoder
pub const MAX_BLOCK_SIZE: usize = 256;

/// Maximum stored length of a field code or raw value
pub const MAX_FIELD_LEN: usize = 255;

/// Number of known field codes
pub const FIELD_COUNT: usize = 19;

/// Known VE.Direct field codes of MPPT charge controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldCode {
    /// `V` - battery voltage, mV
    BatteryVoltage,
    /// `VPV` - panel voltage, mV
    PanelVoltage,
    /// `PPV` - panel power, W
    PanelPower,
    /// `I` - battery current, mA
    BatteryCurrent,
    /// `IL` - load current, mA
    LoadCurrent,
    /// `LOAD` - load output state (ON/OFF)
    LoadState,
    /// `Relay` - relay state (ON/OFF)
    RelayState,
    /// `H19` - yield total
    YieldTotal,
    /// `H20` - yield today
    YieldToday,
    /// `H21` - maximum power today, W
    MaxPowerToday,
    /// `H22` - yield yesterday
    YieldYesterday,
    /// `H23` - maximum power yesterday, W
    MaxPowerYesterday,
    /// `ERR` - error code
    ErrorCode,
    /// `CS` - operational state
    OperationalState,
    /// `FW` - firmware version
    FirmwareVersion,
    /// `PID` - product id
    ProductId,
    /// `SER#` - serial number
    SerialNumber,
    /// `HSDS` - day sequence number
    DaySequence,
    /// `Checksum` - block checksum byte
    Checksum,
}

impl FieldCode {
    /// Look up a field code by its protocol label
    ///
    /// Matching is exact and case-sensitive, as on the wire.
    pub fn from_code(code: &str) -> Option<Self> {
        FIELD_SPECS
            .iter()
            .find(|spec| spec.code.as_str() == code)
            .map(|spec| spec.code)
    }

    /// Protocol label as transmitted
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCode::BatteryVoltage => "V",
            FieldCode::PanelVoltage => "VPV",
            FieldCode::PanelPower => "PPV",
            FieldCode::BatteryCurrent => "I",
            FieldCode::LoadCurrent => "IL",
            FieldCode::LoadState => "LOAD",
            FieldCode::RelayState => "Relay",
            FieldCode::YieldTotal => "H19",
            FieldCode::YieldToday => "H20",
            FieldCode::MaxPowerToday => "H21",
            FieldCode::YieldYesterday => "H22",
            FieldCode::MaxPowerYesterday => "H23",
            FieldCode::ErrorCode => "ERR",
            FieldCode::OperationalState => "CS",
            FieldCode::FirmwareVersion => "FW",
            FieldCode::ProductId => "PID",
            FieldCode::SerialNumber => "SER#",
            FieldCode::DaySequence => "HSDS",
            FieldCode::Checksum => "Checksum",
        }
    }

    /// Catalog entry for this code
    pub fn spec(&self) -> &'static FieldSpec {
        // FIELD_SPECS is declared in enum order
        &FIELD_SPECS[*self as usize]
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        self.spec().label
    }

    /// Conversion rule applied by the normalizer
    pub fn rule(&self) -> ConversionRule {
        self.spec().rule
    }
}

impl std::fmt::Display for FieldCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// SI base unit of a normalized quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    #[serde(rename = "V")]
    Volt,
    #[serde(rename = "A")]
    Ampere,
    #[serde(rename = "W")]
    Watt,
    #[serde(rename = "Wh")]
    WattHour,
}

impl Unit {
    /// Unit symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Watt => "W",
            Unit::WattHour => "Wh",
        }
    }
}

/// How a raw field value is turned into a normalized value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionRule {
    /// Integer in thousandths of `Unit`, divided by 1000
    Milli(Unit),
    /// Integer already in `Unit`
    Base(Unit),
    /// Integer in thousands of `Unit`, multiplied by 1000
    Kilo(Unit),
    /// Integer mapped through the operational state table
    OperationalState,
    /// Integer divided by 100
    FirmwareVersion,
    /// Hex or decimal integer mapped through the product table
    ProductId,
    /// Leading-integer parse, no scaling
    Passthrough,
}

/// Catalog entry of one known field code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Protocol code
    pub code: FieldCode,
    /// Human-readable label
    pub label: &'static str,
    /// Conversion rule
    pub rule: ConversionRule,
}

const MILLI_VOLT: ConversionRule = ConversionRule::Milli(Unit::Volt);
const MILLI_AMP: ConversionRule = ConversionRule::Milli(Unit::Ampere);
const WATT: ConversionRule = ConversionRule::Base(Unit::Watt);
// The yield registers are treated as kWh and reported in Wh
const KILO_WATT_HOUR: ConversionRule = ConversionRule::Kilo(Unit::WattHour);

/// The fixed catalog of known field codes, in record order
pub const FIELD_SPECS: [FieldSpec; FIELD_COUNT] = [
    FieldSpec { code: FieldCode::BatteryVoltage, label: "Battery Voltage", rule: MILLI_VOLT },
    FieldSpec { code: FieldCode::PanelVoltage, label: "Panel Voltage", rule: MILLI_VOLT },
    FieldSpec { code: FieldCode::PanelPower, label: "Panel Power", rule: WATT },
    FieldSpec { code: FieldCode::BatteryCurrent, label: "Battery Current", rule: MILLI_AMP },
    FieldSpec { code: FieldCode::LoadCurrent, label: "Load Current", rule: MILLI_AMP },
    FieldSpec { code: FieldCode::LoadState, label: "Load Output State", rule: ConversionRule::Passthrough },
    FieldSpec { code: FieldCode::RelayState, label: "Relay State", rule: ConversionRule::Passthrough },
    FieldSpec { code: FieldCode::YieldTotal, label: "Yield Total", rule: KILO_WATT_HOUR },
    FieldSpec { code: FieldCode::YieldToday, label: "Yield Today", rule: KILO_WATT_HOUR },
    FieldSpec { code: FieldCode::MaxPowerToday, label: "Maximum Power Today", rule: ConversionRule::Passthrough },
    FieldSpec { code: FieldCode::YieldYesterday, label: "Yield Yesterday", rule: KILO_WATT_HOUR },
    FieldSpec { code: FieldCode::MaxPowerYesterday, label: "Maximum Power Yesterday", rule: ConversionRule::Passthrough },
    FieldSpec { code: FieldCode::ErrorCode, label: "Error Code", rule: ConversionRule::Passthrough },
    FieldSpec { code: FieldCode::OperationalState, label: "Operational State", rule: ConversionRule::OperationalState },
    FieldSpec { code: FieldCode::FirmwareVersion, label: "Firmware Version", rule: ConversionRule::FirmwareVersion },
    FieldSpec { code: FieldCode::ProductId, label: "Type", rule: ConversionRule::ProductId },
    FieldSpec { code: FieldCode::SerialNumber, label: "Serial", rule: ConversionRule::Passthrough },
    FieldSpec { code: FieldCode::DaySequence, label: "Day Sequence Number", rule: ConversionRule::Passthrough },
    FieldSpec { code: FieldCode::Checksum, label: "Checksum", rule: ConversionRule::Passthrough },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_constants() {
        assert_eq!(START_MARKER, &[0x50, 0x49, 0x44, 0x09]);
        assert_eq!(END_MARKER, &[0x43, 0x68, 0x65, 0x63, 0x6B, 0x73, 0x75, 0x6D, 0x09]);
        assert_eq!(VEDIRECT_BAUD_RATE, 19200);
    }

    #[test]
    fn test_field_specs_are_in_enum_order() {
        assert_eq!(FIELD_SPECS.len(), 19);
        for (index, spec) in FIELD_SPECS.iter().enumerate() {
            assert_eq!(spec.code as usize, index, "{} out of order", spec.code);
            assert_eq!(spec.code.spec(), spec);
        }
    }

    #[test]
    fn test_from_code_round_trips_every_label() {
        for spec in FIELD_SPECS.iter() {
            assert_eq!(FieldCode::from_code(spec.code.as_str()), Some(spec.code));
        }
    }

    #[test]
    fn test_from_code_is_case_sensitive() {
        assert_eq!(FieldCode::from_code("checksum"), None);
        assert_eq!(FieldCode::from_code("v"), None);
        assert_eq!(FieldCode::from_code("MPPT"), None);
        assert_eq!(FieldCode::from_code(""), None);
    }

    #[test]
    fn test_rules() {
        assert_eq!(FieldCode::BatteryVoltage.rule(), MILLI_VOLT);
        assert_eq!(FieldCode::LoadCurrent.rule(), MILLI_AMP);
        assert_eq!(FieldCode::YieldYesterday.rule(), KILO_WATT_HOUR);
        assert_eq!(FieldCode::MaxPowerToday.rule(), ConversionRule::Passthrough);
        assert_eq!(FieldCode::ProductId.rule(), ConversionRule::ProductId);
        assert_eq!(FieldCode::ProductId.label(), "Type");
    }

    #[test]
    fn test_field_code_serializes_as_protocol_label() {
        let json = serde_json::to_string(&FieldCode::SerialNumber).unwrap();
        assert_eq!(json, "\"SER#\"");
        assert_eq!(serde_json::to_string(&Unit::WattHour).unwrap(), "\"Wh\"");
    }
}
