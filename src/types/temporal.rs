//! Parsing of DATE, TIMESTAMP and TIME wire strings.
//!
//! Timestamps arrive as `YYYY-MM-DD HH:MM:SS[.fffffffff][Z|±HH[:MM]]`. The
//! fraction is only parsed when the time part contains a `.`, and the offset
//! only when it contains `Z`, `+` or `-`.

use crate::error::ConversionError;
use crate::types::Value;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ConversionError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| invalid("DATE", raw, e))
}

/// Parse a `TIMESTAMP*` value.
///
/// # Errors
/// Returns `ConversionError::InvalidValue` when the value does not contain
/// exactly one space separating date and time.
pub fn parse_timestamp(raw: &str, declared_type: &str) -> Result<Value, ConversionError> {
    let mut parts = raw.split(' ');
    let (date_part, time_part) = match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), None) => (date, time),
        _ => return Err(invalid(declared_type, raw, "invalid timestamp")),
    };

    let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|e| invalid(declared_type, raw, e))?;
    let (clock, offset) = split_offset(time_part).map_err(|m| invalid(declared_type, raw, m))?;
    let time = parse_clock(clock).map_err(|e| invalid(declared_type, raw, e))?;

    let offset = offset.unwrap_or_else(utc);
    NaiveDateTime::new(date, time)
        .and_local_timezone(offset)
        .single()
        .map(Value::Timestamp)
        .ok_or_else(|| invalid(declared_type, raw, "ambiguous local time"))
}

/// Parse a `TIME` or `TIME(n)` value.
pub fn parse_time(raw: &str, declared_type: &str) -> Result<Value, ConversionError> {
    let (clock, offset) = split_offset(raw).map_err(|m| invalid(declared_type, raw, m))?;
    let time = parse_clock(clock).map_err(|e| invalid(declared_type, raw, e))?;
    Ok(Value::Time { time, offset })
}

fn parse_clock(clock: &str) -> Result<NaiveTime, chrono::ParseError> {
    if clock.contains('.') {
        NaiveTime::parse_from_str(clock, "%H:%M:%S%.f")
    } else {
        NaiveTime::parse_from_str(clock, "%H:%M:%S")
    }
}

/// Split `HH:MM:SS[.f]<offset>` into the clock and the parsed offset.
fn split_offset(time_part: &str) -> Result<(&str, Option<FixedOffset>), String> {
    let Some(at) = time_part.find(['Z', '+', '-']) else {
        return Ok((time_part, None));
    };
    let (clock, zone) = time_part.split_at(at);
    Ok((clock, Some(parse_offset(zone)?)))
}

fn parse_offset(zone: &str) -> Result<FixedOffset, String> {
    if zone == "Z" {
        return Ok(utc());
    }

    let sign = match zone.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(format!("invalid offset '{}'", zone)),
    };
    let digits: String = zone[1..].chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid offset '{}'", zone));
    }

    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(format!("invalid offset '{}'", zone)),
    };
    let hours: i32 = hours.parse().map_err(|_| format!("invalid offset '{}'", zone))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("invalid offset '{}'", zone))?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset out of range '{}'", zone))
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn invalid(declared_type: &str, raw: &str, message: impl ToString) -> ConversionError {
    ConversionError::InvalidValue {
        declared_type: declared_type.to_string(),
        value: raw.to_string(),
        message: message.to_string(),
    }
}
