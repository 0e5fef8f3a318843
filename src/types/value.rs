//! Native values produced by the wire codec.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::fmt;

/// A decoded cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    /// Text, including the raw form of structured and unknown types
    String(String),
    /// Integer families
    Int64(i64),
    /// FLOAT, DOUBLE and DECIMAL families
    Float64(f64),
    /// Calendar date
    Date(NaiveDate),
    /// Point in time; UTC when the wire value carried no offset
    Timestamp(DateTime<FixedOffset>),
    /// Time of day with the offset the wire value carried, if any
    Time {
        time: NaiveTime,
        offset: Option<FixedOffset>,
    },
    /// Binary data
    Bytes(Vec<u8>),
    /// BOOLEAN
    Bool(bool),
}

impl Value {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Value::Time { time, .. } => Some(*time),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(s) => write!(f, "{}", s),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Time { time, offset } => match offset {
                Some(offset) => write!(f, "{}{}", time, offset),
                None => write!(f, "{}", time),
            },
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Bool(v) => write!(f, "{}", v),
        }
    }
}
