//! Wire codec: declared column types, scan types and cell decoding.

mod mapping;
mod schema;
mod temporal;
mod value;

pub use mapping::{
    decode, display_type_name, scan_type, ScanType, TypeFamily, WireFormat, FAMILY_PREFIXES,
};
pub use schema::ColumnType;
pub use temporal::{parse_date, parse_time, parse_timestamp};
pub use value::Value;
