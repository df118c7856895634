//! Store type definitions
//!
//! Column descriptions, declared field types and record values shared by
//! the storage backend and the import pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =========================================================================
// Field Types
// =========================================================================

/// Declared type of a destination column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    #[default]
    Text,
    Integer,
    Date,
    Boolean,
}

impl FieldType {
    pub const ALL: [FieldType; 4] = [
        FieldType::Text,
        FieldType::Integer,
        FieldType::Date,
        FieldType::Boolean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }

    /// Map a declared column type reported by the backend.
    /// Anything unrecognised is treated as text.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.contains("INT") {
            FieldType::Integer
        } else if upper.contains("BOOL") {
            FieldType::Boolean
        } else if upper.contains("DATE") || upper.contains("TIME") {
            FieldType::Date
        } else {
            FieldType::Text
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "string" => Ok(FieldType::Text),
            "integer" | "int" => Ok(FieldType::Integer),
            "date" => Ok(FieldType::Date),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            _ => Err(format!(
                "Unknown field type: '{}'. Supported: text, integer, date, boolean",
                s
            )),
        }
    }
}

// =========================================================================
// Columns and Records
// =========================================================================

/// A column of a stored table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
}

impl Column {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// One stored row, column name to value. `None` is SQL NULL.
pub type Record = BTreeMap<String, Option<String>>;

/// Read a record value with NULL and a missing column both reading as ""
pub fn record_value<'a>(record: &'a Record, field: &str) -> &'a str {
    record
        .get(field)
        .and_then(|v| v.as_deref())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_parse() {
        assert_eq!("Integer".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("bool".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert_eq!(" date ".parse::<FieldType>().unwrap(), FieldType::Date);
        assert!("blob".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_field_type_from_declared() {
        assert_eq!(FieldType::from_declared("INTEGER"), FieldType::Integer);
        assert_eq!(FieldType::from_declared("BIGINT"), FieldType::Integer);
        assert_eq!(FieldType::from_declared("BOOLEAN"), FieldType::Boolean);
        assert_eq!(FieldType::from_declared("DATETIME"), FieldType::Date);
        assert_eq!(FieldType::from_declared("VARCHAR(40)"), FieldType::Text);
        assert_eq!(FieldType::from_declared(""), FieldType::Text);
    }

    #[test]
    fn test_record_value_treats_null_as_empty() {
        let mut record = Record::new();
        record.insert("OS".to_string(), None);
        record.insert("AssetName".to_string(), Some("PC1".to_string()));

        assert_eq!(record_value(&record, "OS"), "");
        assert_eq!(record_value(&record, "Missing"), "");
        assert_eq!(record_value(&record, "AssetName"), "PC1");
    }
}
