//! Column and column type definitions.

use std::fmt;

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Integer affinity.
    Integer,
    /// Floating point affinity.
    Real,
    /// Text affinity.
    Text,
    /// Binary data.
    Blob,
    /// Boolean stored as integer.
    Boolean,
    /// Timestamp.
    DateTime,
    /// Anything else (numeric affinity).
    Numeric,
}

impl ColumnType {
    /// Map a declared SQL type to a column type using SQLite affinity rules.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            ColumnType::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else if upper.contains("DATE") || upper.contains("TIME") {
            ColumnType::DateTime
        } else if upper.contains("BOOL") {
            ColumnType::Boolean
        } else {
            ColumnType::Numeric
        }
    }

    /// SQL type name used when creating tables.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Numeric => "NUMERIC",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Whether the column is (part of) the primary key.
    pub primary_key: bool,
}

impl ColumnDef {
    /// Create a non-key column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
        }
    }

    /// Mark as primary key.
    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}
