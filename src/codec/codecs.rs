//! Codec implementations
//!
//! One unit struct per field type.

use super::types::ValueCodec;
use crate::catalog::FieldType;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static DECIMAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap()
});

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.6f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const TIMESTAMP_TZ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

fn invalid(field_type: FieldType, value: &JsonValue, message: impl Into<String>) -> Error {
    Error::codec(field_type, value, message)
}

/// Borrow the string payload or fail
fn expect_str(field_type: FieldType, value: &JsonValue) -> Result<&str> {
    value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| invalid(field_type, value, "expected a string"))
}

// ============================================================================
// Boolean
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl ValueCodec for BooleanCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Boolean
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        match value {
            JsonValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(JsonValue::Bool(true)),
                "false" | "f" | "0" => Ok(JsonValue::Bool(false)),
                _ => Err(invalid(self.field_type(), value, "not a boolean")),
            },
            JsonValue::Number(n) => match n.as_i64() {
                Some(0) => Ok(JsonValue::Bool(false)),
                Some(1) => Ok(JsonValue::Bool(true)),
                _ => Err(invalid(self.field_type(), value, "not a boolean")),
            },
            _ => Err(invalid(self.field_type(), value, "not a boolean")),
        }
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(a.as_bool()?.cmp(&b.as_bool()?))
    }
}

// ============================================================================
// Integer
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

fn as_i128(value: &JsonValue) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

impl ValueCodec for IntegerCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Integer
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        match value {
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            JsonValue::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                    Ok(JsonValue::from(f as i64))
                }
                _ => Err(invalid(self.field_type(), value, "not an integer")),
            },
            JsonValue::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(JsonValue::from(i))
                } else if let Ok(u) = s.parse::<u64>() {
                    Ok(JsonValue::from(u))
                } else {
                    Err(invalid(self.field_type(), value, "not an integer"))
                }
            }
            _ => Err(invalid(self.field_type(), value, "not an integer")),
        }
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(as_i128(a)?.cmp(&as_i128(b)?))
    }
}

// ============================================================================
// Number
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberCodec;

impl ValueCodec for NumberCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Number
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        let parsed = match value {
            JsonValue::Number(_) => return Ok(value.clone()),
            JsonValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .ok_or_else(|| invalid(self.field_type(), value, "not a finite number"))
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        a.as_f64()?.partial_cmp(&b.as_f64()?)
    }
}

// ============================================================================
// Decimal
// ============================================================================

/// Exact decimals travel as strings so no precision is lost
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalCodec;

impl ValueCodec for DecimalCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Decimal
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        let text = match value {
            JsonValue::Number(n) => n.to_string(),
            JsonValue::String(s) => s.trim().to_string(),
            _ => return Err(invalid(self.field_type(), value, "not a decimal")),
        };
        if !DECIMAL_PATTERN.is_match(&text) {
            return Err(invalid(self.field_type(), value, "not a decimal"));
        }
        Ok(JsonValue::String(text))
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        let a = a.as_str()?.parse::<f64>().ok()?;
        let b = b.as_str()?.parse::<f64>().ok()?;
        a.partial_cmp(&b)
    }
}

// ============================================================================
// String
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl ValueCodec for StringCodec {
    fn field_type(&self) -> FieldType {
        FieldType::String
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        match value {
            JsonValue::String(_) => Ok(value.clone()),
            JsonValue::Number(n) => Ok(JsonValue::String(n.to_string())),
            JsonValue::Bool(b) => Ok(JsonValue::String(b.to_string())),
            _ => Err(invalid(self.field_type(), value, "not a string")),
        }
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(a.as_str()?.cmp(b.as_str()?))
    }
}

// ============================================================================
// Date / Time
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec;

fn parse_date(value: &JsonValue) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

impl ValueCodec for DateCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Date
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        let s = expect_str(self.field_type(), value)?;
        let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map_err(|e| invalid(self.field_type(), value, e.to_string()))?;
        Ok(JsonValue::String(date.format(DATE_FORMAT).to_string()))
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(parse_date(a)?.cmp(&parse_date(b)?))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeCodec;

fn parse_time(value: &JsonValue) -> Option<NaiveTime> {
    let s = value.as_str()?.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok()
}

impl ValueCodec for TimeCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Time
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        expect_str(self.field_type(), value)?;
        let time =
            parse_time(value).ok_or_else(|| invalid(self.field_type(), value, "not a time"))?;
        Ok(JsonValue::String(time.format(TIME_FORMAT).to_string()))
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(parse_time(a)?.cmp(&parse_time(b)?))
    }
}

// ============================================================================
// Timestamps
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCodec;

fn parse_timestamp(value: &JsonValue) -> Option<NaiveDateTime> {
    let s = value.as_str()?.trim();
    let s = s.strip_suffix('Z').unwrap_or(s);
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

impl ValueCodec for TimestampCodec {
    fn field_type(&self) -> FieldType {
        FieldType::TimestampWithoutTimezone
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        expect_str(self.field_type(), value)?;
        let ts = parse_timestamp(value)
            .ok_or_else(|| invalid(self.field_type(), value, "not a timestamp"))?;
        Ok(JsonValue::String(ts.format(TIMESTAMP_FORMAT).to_string()))
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(parse_timestamp(a)?.cmp(&parse_timestamp(b)?))
    }
}

/// Keeps the original offset; ordering is by instant
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampTzCodec;

fn parse_timestamp_tz(value: &JsonValue) -> Option<DateTime<FixedOffset>> {
    let s = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .ok()
        .or_else(|| parse_timestamp(value).map(|naive| naive.and_utc().fixed_offset()))
}

impl ValueCodec for TimestampTzCodec {
    fn field_type(&self) -> FieldType {
        FieldType::TimestampWithTimezone
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        expect_str(self.field_type(), value)?;
        let ts = parse_timestamp_tz(value)
            .ok_or_else(|| invalid(self.field_type(), value, "not a timestamp with time zone"))?;
        Ok(JsonValue::String(ts.format(TIMESTAMP_TZ_FORMAT).to_string()))
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(parse_timestamp_tz(a)?.cmp(&parse_timestamp_tz(b)?))
    }
}

// ============================================================================
// Binary / JSON
// ============================================================================

/// Bytes as standard base64
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

fn parse_binary(value: &JsonValue) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(value.as_str()?.trim())
        .ok()
}

impl ValueCodec for BinaryCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Binary
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        expect_str(self.field_type(), value)?;
        let bytes =
            parse_binary(value).ok_or_else(|| invalid(self.field_type(), value, "not base64"))?;
        Ok(JsonValue::String(
            base64::engine::general_purpose::STANDARD.encode(bytes),
        ))
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        Some(parse_binary(a)?.cmp(&parse_binary(b)?))
    }
}

/// Opaque JSON, only equality is meaningful
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Json
    }

    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue> {
        Ok(value.clone())
    }

    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
        (a == b).then_some(Ordering::Equal)
    }
}
