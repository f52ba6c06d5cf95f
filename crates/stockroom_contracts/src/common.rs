#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

/// Largest money amount accepted or produced: 9 999 999 999 999.99.
///
/// Amounts travel as JSON numbers, which decode through `f64`. Up to fifteen significant
/// digits at two decimal places survive that trip unchanged; larger amounts would not.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_319, 232_830, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasonCodeId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        got: usize,
    },
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
    },
}

impl ContractViolation {
    pub fn field(&self) -> &'static str {
        match self {
            ContractViolation::InvalidValue { field, .. }
            | ContractViolation::InvalidLength { field, .. }
            | ContractViolation::InvalidRange { field, .. } => field,
        }
    }

    /// Message without the field name, as shown next to a form input.
    pub fn reason_text(&self) -> String {
        match self {
            ContractViolation::InvalidValue { reason, .. } => (*reason).to_string(),
            ContractViolation::InvalidLength { min, max, got, .. } => {
                if *got == 0 && *min > 0 {
                    "must not be empty".to_string()
                } else if *min > 0 {
                    format!("must be between {min} and {max} characters (got {got})")
                } else {
                    format!("must be at most {max} characters (got {got})")
                }
            }
            ContractViolation::InvalidRange { min, max, got, .. } => {
                if max.is_infinite() {
                    format!("must be >= {min} (got {got})")
                } else {
                    format!("must be between {min} and {max} (got {got})")
                }
            }
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field(), self.reason_text())
    }
}

impl std::error::Error for ContractViolation {}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Field -> message map used by forms and error envelopes. The first violation per field wins.
pub fn field_errors(violations: &[ContractViolation]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for v in violations {
        out.entry(v.field().to_string())
            .or_insert_with(|| v.reason_text());
    }
    out
}

pub(crate) fn first_violation(violations: Vec<ContractViolation>) -> Result<(), ContractViolation> {
    match violations.into_iter().next() {
        Some(v) => Err(v),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum RecordStatus {
    #[default]
    #[serde(rename = "ACTIVO", alias = "ACTIVA", alias = "activo", alias = "activa")]
    Active,
    #[serde(
        rename = "INACTIVO",
        alias = "INACTIVA",
        alias = "inactivo",
        alias = "inactiva"
    )]
    Inactive,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "ACTIVO",
            RecordStatus::Inactive => "INACTIVO",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACTIVO" | "ACTIVA" => Some(RecordStatus::Active),
            "INACTIVO" | "INACTIVA" => Some(RecordStatus::Inactive),
            _ => None,
        }
    }
}

pub(crate) fn push_required_text(
    out: &mut Vec<ContractViolation>,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) {
    let got = value.trim().chars().count();
    if got < min.max(1) || got > max {
        out.push(ContractViolation::InvalidLength {
            field,
            min: min.max(1),
            max,
            got,
        });
    }
}

pub(crate) fn push_optional_text(
    out: &mut Vec<ContractViolation>,
    field: &'static str,
    value: Option<&str>,
    max: usize,
) {
    if let Some(value) = value {
        let got = value.chars().count();
        if got > max {
            out.push(ContractViolation::InvalidLength {
                field,
                min: 0,
                max,
                got,
            });
        }
    }
}

/// Money amount above `min` (or equal, when `inclusive`) and at most `MAX_AMOUNT`.
pub(crate) fn push_amount(
    out: &mut Vec<ContractViolation>,
    field: &'static str,
    value: Decimal,
    min: Decimal,
    inclusive: bool,
) {
    let above_min = if inclusive { value >= min } else { value > min };
    if !above_min || value > MAX_AMOUNT {
        out.push(ContractViolation::InvalidRange {
            field,
            min: decimal_to_f64(min),
            max: decimal_to_f64(MAX_AMOUNT),
            got: decimal_to_f64(value),
        });
    }
}

pub(crate) fn push_int_range(
    out: &mut Vec<ContractViolation>,
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) {
    if value < min || value > max {
        out.push(ContractViolation::InvalidRange {
            field,
            min: min as f64,
            max: if max == i64::MAX {
                f64::INFINITY
            } else {
                max as f64
            },
            got: value as f64,
        });
    }
}

pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub(crate) fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

pub(crate) fn trimmed_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parses a zone-less date-time as exchanged on the wire. Accepts minute precision,
/// optional fraction, a trailing `Z`, and a bare date (midnight).
pub fn parse_wire_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    for format in [
        WIRE_DATETIME_FORMAT,
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(v) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(v);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn format_wire_datetime(value: &NaiveDateTime) -> String {
    value.format(WIRE_DATETIME_FORMAT).to_string()
}

pub mod wire_datetime {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_wire_datetime(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_wire_datetime(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid date-time '{raw}'")))
    }
}

pub mod wire_datetime_opt {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&super::format_wire_datetime(v)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => super::parse_wire_datetime(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid date-time '{raw}'"))),
        }
    }
}
