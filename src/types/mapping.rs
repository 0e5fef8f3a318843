//! Declared-type families and cell decoding.
//!
//! Column types are matched by prefix, so `DECIMAL(10,2)` belongs to the
//! `DECIMAL` family and `VARCHAR;nowrap` to the `VARCHAR` family. The
//! order of [`FAMILY_PREFIXES`] is the matching precedence.

use crate::error::ConversionError;
use crate::types::temporal;
use crate::types::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Family a declared column type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// VARCHAR, ARRAY, MAP and STRUCT: passed through as text
    Text,
    Date,
    /// TINYINT, SMALLINT and INTEGER
    Integer,
    BigInt,
    /// FLOAT, DOUBLE and DECIMAL
    Float,
    Timestamp,
    Time,
    /// VARBINARY and BYTES, base64 on the wire
    Binary,
    Boolean,
}

/// Prefix table, in precedence order. `TIMESTAMP` precedes `TIME`.
pub static FAMILY_PREFIXES: &[(&str, TypeFamily)] = &[
    ("VARCHAR", TypeFamily::Text),
    ("ARRAY", TypeFamily::Text),
    ("MAP", TypeFamily::Text),
    ("STRUCT", TypeFamily::Text),
    ("DATE", TypeFamily::Date),
    ("TINYINT", TypeFamily::Integer),
    ("SMALLINT", TypeFamily::Integer),
    ("INTEGER", TypeFamily::Integer),
    ("BIGINT", TypeFamily::BigInt),
    ("FLOAT", TypeFamily::Float),
    ("DOUBLE", TypeFamily::Float),
    ("DECIMAL", TypeFamily::Float),
    ("TIMESTAMP", TypeFamily::Timestamp),
    ("TIME", TypeFamily::Time),
    ("VARBINARY", TypeFamily::Binary),
    ("BYTES", TypeFamily::Binary),
    ("BOOLEAN", TypeFamily::Boolean),
];

impl TypeFamily {
    /// Resolve the family of a declared type string.
    ///
    /// Returns `None` for types the driver does not know.
    pub fn of(declared_type: &str) -> Option<Self> {
        FAMILY_PREFIXES
            .iter()
            .find(|(prefix, _)| declared_type.starts_with(prefix))
            .map(|(_, family)| *family)
    }
}

/// Wire format the cell came from.
///
/// Bounded result sets and streaming results encode two families
/// differently: streaming leaves `DATE` as the server's string and sends
/// `BIGINT` as a decimal that may carry a fraction or exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Bounded, partitioned result set
    Paged,
    /// Push stream over a socket
    Streamed,
}

/// Native type a column decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    String,
    Int64,
    Float64,
    Date,
    Timestamp,
    Time,
    Bytes,
    Bool,
}

/// Native type a declared column type decodes into for the given format.
pub fn scan_type(declared_type: &str, format: WireFormat) -> ScanType {
    match TypeFamily::of(declared_type) {
        Some(TypeFamily::Text) | None => ScanType::String,
        Some(TypeFamily::Date) => match format {
            WireFormat::Paged => ScanType::Date,
            WireFormat::Streamed => ScanType::String,
        },
        Some(TypeFamily::Integer) | Some(TypeFamily::BigInt) => ScanType::Int64,
        Some(TypeFamily::Float) => ScanType::Float64,
        Some(TypeFamily::Timestamp) => ScanType::Timestamp,
        Some(TypeFamily::Time) => ScanType::Time,
        Some(TypeFamily::Binary) => ScanType::Bytes,
        Some(TypeFamily::Boolean) => ScanType::Bool,
    }
}

/// Decode one wire cell.
///
/// A `None` cell is always [`Value::Null`]. Unknown declared types are
/// returned as their raw string.
///
/// # Errors
/// Returns `ConversionError` if the cell cannot be parsed as its family.
pub fn decode(
    cell: Option<&str>,
    declared_type: &str,
    format: WireFormat,
) -> Result<Value, ConversionError> {
    let Some(raw) = cell else {
        return Ok(Value::Null);
    };

    let family = match TypeFamily::of(declared_type) {
        Some(family) => family,
        None => return Ok(Value::String(raw.to_string())),
    };

    match family {
        TypeFamily::Text => Ok(Value::String(raw.to_string())),
        TypeFamily::Date => match format {
            WireFormat::Paged => temporal::parse_date(raw).map(Value::Date),
            WireFormat::Streamed => Ok(Value::String(raw.to_string())),
        },
        TypeFamily::Integer => raw
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| invalid(declared_type, raw, e)),
        TypeFamily::BigInt => match format {
            WireFormat::Paged => raw
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| invalid(declared_type, raw, e)),
            WireFormat::Streamed => parse_decimal_integer(raw, declared_type).map(Value::Int64),
        },
        TypeFamily::Float => raw
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| invalid(declared_type, raw, e)),
        TypeFamily::Timestamp => temporal::parse_timestamp(raw, declared_type),
        TypeFamily::Time => temporal::parse_time(raw, declared_type),
        TypeFamily::Binary => STANDARD
            .decode(raw)
            .map(Value::Bytes)
            .map_err(|e| invalid(declared_type, raw, e)),
        TypeFamily::Boolean => Ok(Value::Bool(raw.eq_ignore_ascii_case("true"))),
    }
}

/// Parse an arbitrary-precision decimal, truncating toward zero to an i64.
///
/// Accepts an optional sign, digits with an optional fraction, and an
/// optional exponent, e.g. `-1.5e3`.
fn parse_decimal_integer(raw: &str, declared_type: &str) -> Result<i64, ConversionError> {
    let text = raw.trim();
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => {
            let exponent: i64 = unsigned[at + 1..]
                .parse()
                .map_err(|_| invalid(declared_type, raw, "invalid exponent"))?;
            (&unsigned[..at], exponent)
        }
        None => (unsigned, 0),
    };
    let (integral, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (integral.is_empty() && fraction.is_empty()) || !all_digits(integral) || !all_digits(fraction)
    {
        return Err(invalid(declared_type, raw, "invalid decimal"));
    }

    let mut digits = format!("{}{}", integral, fraction);
    if digits.bytes().all(|b| b == b'0') {
        return Ok(0);
    }
    // Widened so extreme exponents cannot overflow.
    let scale = i128::from(exponent) - fraction.len() as i128;
    if scale >= 0 {
        if scale > 19 {
            return Err(ConversionError::NumericOverflow {
                value: raw.to_string(),
            });
        }
        digits.extend(std::iter::repeat('0').take(scale as usize));
    } else {
        let keep = digits.len() as i128 + scale;
        digits.truncate(keep.max(0) as usize);
    }

    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 19 {
        return Err(ConversionError::NumericOverflow {
            value: raw.to_string(),
        });
    }

    let magnitude: i128 = significant
        .parse()
        .map_err(|_| invalid(declared_type, raw, "invalid decimal"))?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| ConversionError::NumericOverflow {
        value: raw.to_string(),
    })
}

/// Type name reported for a column.
///
/// Declared types may carry display hints after a `;`. Without hints
/// enabled, only the base type is reported. Streaming columns with hints
/// enabled gain a leading `streaming=true` hint.
pub fn display_type_name(declared_type: &str, hints_enabled: bool, format: WireFormat) -> String {
    let (base, hints) = match declared_type.split_once(';') {
        Some((base, hints)) => (base, Some(hints)),
        None => (declared_type, None),
    };

    match (hints_enabled, format) {
        (false, _) => base.to_string(),
        (true, WireFormat::Paged) => declared_type.to_string(),
        (true, WireFormat::Streamed) => match hints {
            Some(hints) => format!("{};streaming=true,{}", base, hints),
            None => format!("{};streaming=true", base),
        },
    }
}

fn invalid(declared_type: &str, raw: &str, message: impl ToString) -> ConversionError {
    ConversionError::InvalidValue {
        declared_type: declared_type.to_string(),
        value: raw.to_string(),
        message: message.to_string(),
    }
}
