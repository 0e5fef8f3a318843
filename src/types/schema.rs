//! Column metadata exposed by row cursors.

use crate::types::{display_type_name, scan_type, ScanType, WireFormat};

/// Introspectable description of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    /// Column name
    pub name: String,
    /// Whether the column may contain NULL
    pub nullable: bool,
    /// Type name as reported to the caller, hints applied
    pub database_type: String,
    /// Native type cells decode into
    pub scan_type: ScanType,
    /// Declared length, when the server reports one
    pub length: Option<i64>,
    /// Declared precision, when the server reports one
    pub precision: Option<i64>,
    /// Declared scale, when the server reports one
    pub scale: Option<i64>,
}

impl ColumnType {
    /// Describe a column from its declared type.
    ///
    /// # Arguments
    /// * `name` - Column name
    /// * `declared_type` - Type string as sent by the server, hints included
    /// * `nullable` - Nullability flag
    /// * `hints_enabled` - Whether display hints are reported
    /// * `format` - Wire format of the cursor the column belongs to
    pub fn new(
        name: impl Into<String>,
        declared_type: &str,
        nullable: bool,
        hints_enabled: bool,
        format: WireFormat,
    ) -> Self {
        Self {
            name: name.into(),
            nullable,
            database_type: display_type_name(declared_type, hints_enabled, format),
            scan_type: scan_type(declared_type, format),
            length: None,
            precision: None,
            scale: None,
        }
    }

    /// Attach length, precision and scale.
    pub fn with_dimensions(
        mut self,
        length: Option<i64>,
        precision: Option<i64>,
        scale: Option<i64>,
    ) -> Self {
        self.length = length;
        self.precision = precision;
        self.scale = scale;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_paged() {
        let col = ColumnType::new("createdAt", "TIMESTAMP_TZ", true, false, WireFormat::Paged);
        assert_eq!(col.name, "createdAt");
        assert_eq!(col.database_type, "TIMESTAMP_TZ");
        assert_eq!(col.scan_type, ScanType::Timestamp);
        assert!(col.nullable);
        assert_eq!(col.length, None);
    }

    #[test]
    fn test_column_type_streamed_with_dimensions() {
        let col = ColumnType::new("amount", "DECIMAL(10,2)", false, true, WireFormat::Streamed)
            .with_dimensions(None, Some(10), Some(2));
        assert_eq!(col.database_type, "DECIMAL(10,2);streaming=true");
        assert_eq!(col.scan_type, ScanType::Float64);
        assert_eq!(col.precision, Some(10));
        assert_eq!(col.scale, Some(2));
    }
}
