//! # VE.Direct Unit Normalizer
//!
//! Converts raw field strings into SI quantities and enumeration labels.
//!
//! Parsing is lenient: a leading integer is taken, trailing garbage
//! is ignored, and empty or non-numeric input reads as 0. Unmapped operational
//! states keep their raw string; unmapped product ids read as `*UNKNOWN*`.

use super::protocol::{ConversionRule, FieldCode, Unit};
use serde::Serialize;

/// Label for product ids missing from the product table
pub const UNKNOWN_PRODUCT: &str = "*UNKNOWN*";

/// Operational state (`CS`) labels
const OPERATIONAL_STATES: &[(i64, &str)] = &[
    (0, "Off"),
    (2, "Fault"),
    (3, "Bulk"),
    (4, "Absorption"),
    (5, "Float"),
];

/// Known BlueSolar / SmartSolar MPPT product ids
const PRODUCTS: &[(i64, &str)] = &[
    (0x0300, "BlueSolar MPPT 70/15"),
    (0xA040, "BlueSolar MPPT 75/50"),
    (0xA041, "BlueSolar MPPT 150/35"),
    (0xA042, "BlueSolar MPPT 75/15"),
    (0xA043, "BlueSolar MPPT 100/15"),
    (0xA044, "BlueSolar MPPT 100/30"),
    (0xA045, "BlueSolar MPPT 100/50"),
    (0xA046, "BlueSolar MPPT 150/70"),
    (0xA047, "BlueSolar MPPT 150/100"),
    (0xA048, "BlueSolar MPPT 75/50 rev2"),
    (0xA049, "BlueSolar MPPT 100/50 rev2"),
    (0xA04A, "BlueSolar MPPT 100/30 rev2"),
    (0xA04B, "BlueSolar MPPT 100/35 rev2"),
    (0xA04C, "BlueSolar MPPT 75/10"),
    (0xA04D, "BlueSolar MPPT 150/45"),
    (0xA04E, "BlueSolar MPPT 150/60"),
    (0xA04F, "BlueSolar MPPT 150/85"),
    (0xA050, "SmartSolar MPPT 250/100"),
    (0xA051, "SmartSolar MPPT 150/100"),
    (0xA052, "SmartSolar MPPT 150/85"),
    (0xA053, "SmartSolar MPPT 75/15"),
    (0xA054, "SmartSolar MPPT 75/10"),
    (0xA055, "SmartSolar MPPT 100/15"),
    (0xA056, "SmartSolar MPPT 100/30"),
    (0xA057, "SmartSolar MPPT 100/50"),
    (0xA058, "SmartSolar MPPT 150/35"),
    (0xA059, "SmartSolar MPPT 150/100 rev2"),
    (0xA05A, "SmartSolar MPPT 150/85 rev2"),
    (0xA05B, "SmartSolar MPPT 250/70 rev2"),
    (0xA05C, "SmartSolar MPPT 250/85"),
    (0xA05D, "SmartSolar MPPT 250/60"),
    (0xA05E, "SmartSolar MPPT 250/45"),
    (0xA05F, "SmartSolar MPPT 100/20"),
];

/// A raw field value after normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedValue {
    /// Measurement in an SI base unit
    Quantity { value: f64, unit: Unit },
    /// Dimensionless decimal, such as a firmware version
    Decimal { value: f64 },
    /// Code mapped through a lookup table
    Enumerated { code: i64, label: String },
    /// Plain integer, no unit
    Numeric { value: i64 },
}

impl NormalizedValue {
    /// Numeric view: the quantity, the enumeration code or the integer
    pub fn as_f64(&self) -> f64 {
        match self {
            NormalizedValue::Quantity { value, .. } => *value,
            NormalizedValue::Decimal { value } => *value,
            NormalizedValue::Enumerated { code, .. } => *code as f64,
            NormalizedValue::Numeric { value } => *value as f64,
        }
    }

    /// Enumeration label, if this value is enumerated
    pub fn label(&self) -> Option<&str> {
        match self {
            NormalizedValue::Enumerated { label, .. } => Some(label),
            _ => None,
        }
    }
}

/// Split off leading whitespace and an optional sign
fn split_sign(raw: &str) -> (bool, &str) {
    let trimmed = raw.trim_start();
    match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    }
}

/// Accumulate leading digits of `radix`, saturating on overflow
fn leading_digits(digits: &str, radix: u32) -> i64 {
    digits
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(radix as i64).saturating_add(digit as i64)
        })
}

/// Parse the leading decimal integer of `raw`
///
/// Trailing characters are ignored; empty or non-numeric input yields 0.
///
/// # Examples
///
/// ```
/// use vedirect_capture::vedirect::normalizer::parse_leading_int;
///
/// assert_eq!(parse_leading_int("12560"), 12560);
/// assert_eq!(parse_leading_int("-350mA"), -350);
/// assert_eq!(parse_leading_int("ON"), 0);
/// ```
pub fn parse_leading_int(raw: &str) -> i64 {
    let (negative, rest) = split_sign(raw);
    let value = leading_digits(rest, 10);
    if negative { -value } else { value }
}

/// Parse an integer whose base follows its prefix: `0x` hex, otherwise decimal
///
/// # Examples
///
/// ```
/// use vedirect_capture::vedirect::normalizer::parse_prefixed_int;
///
/// assert_eq!(parse_prefixed_int("0xA050"), 0xA050);
/// assert_eq!(parse_prefixed_int("768"), 0x300);
/// ```
pub fn parse_prefixed_int(raw: &str) -> i64 {
    let (negative, rest) = split_sign(raw);
    let value = match rest.get(..2) {
        Some("0x") | Some("0X") => leading_digits(&rest[2..], 16),
        _ => leading_digits(rest, 10),
    };
    if negative { -value } else { value }
}

/// Label of an operational state code, if known
pub fn operational_state_label(code: i64) -> Option<&'static str> {
    OPERATIONAL_STATES
        .iter()
        .find(|(state, _)| *state == code)
        .map(|(_, label)| *label)
}

/// Model name of a product id, if known
pub fn product_name(pid: i64) -> Option<&'static str> {
    PRODUCTS
        .iter()
        .find(|(id, _)| *id == pid)
        .map(|(_, name)| *name)
}

/// Normalize the raw value of a known field
///
/// # Arguments
///
/// * `code` - Field code, selects the conversion rule
/// * `raw` - Raw value as decoded from the block
///
/// # Returns
///
/// * `NormalizedValue` - SI quantity, enumeration or plain integer
///
/// # Examples
///
/// ```
/// use vedirect_capture::vedirect::normalizer::{normalize, NormalizedValue};
/// use vedirect_capture::vedirect::protocol::{FieldCode, Unit};
///
/// assert_eq!(
///     normalize(FieldCode::BatteryVoltage, "12560"),
///     NormalizedValue::Quantity { value: 12.56, unit: Unit::Volt }
/// );
/// ```
pub fn normalize(code: FieldCode, raw: &str) -> NormalizedValue {
    match code.rule() {
        ConversionRule::Milli(unit) => NormalizedValue::Quantity {
            value: parse_leading_int(raw) as f64 / 1000.0,
            unit,
        },
        ConversionRule::Base(unit) => NormalizedValue::Quantity {
            value: parse_leading_int(raw) as f64,
            unit,
        },
        ConversionRule::Kilo(unit) => NormalizedValue::Quantity {
            value: parse_leading_int(raw) as f64 * 1000.0,
            unit,
        },
        ConversionRule::OperationalState => {
            let state = parse_leading_int(raw);
            let label = operational_state_label(state)
                .map(str::to_string)
                .unwrap_or_else(|| raw.to_string());
            NormalizedValue::Enumerated { code: state, label }
        }
        ConversionRule::FirmwareVersion => NormalizedValue::Decimal {
            value: parse_leading_int(raw) as f64 / 100.0,
        },
        ConversionRule::ProductId => {
            let pid = parse_prefixed_int(raw);
            NormalizedValue::Enumerated {
                code: pid,
                label: product_name(pid).unwrap_or(UNKNOWN_PRODUCT).to_string(),
            }
        }
        ConversionRule::Passthrough => NormalizedValue::Numeric {
            value: parse_leading_int(raw),
        },
    }
}
