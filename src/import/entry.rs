//! Import rows and their reconciliation status

use std::collections::BTreeMap;
use std::fmt;

use crate::core::store::Record;
use crate::import::error::{ImportError, Result};
use crate::import::mapper::FieldMapping;
use crate::import::reader::ParsedTable;

/// Reconciliation status of one imported row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowStatus {
    /// No existing record has this natural key
    New,
    /// Every mapped field equals the existing record
    Duplicate,
    /// At least one mapped field differs from the existing record
    Conflict,
    /// The user merged this row against the existing record
    Resolved,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::New => "new",
            RowStatus::Duplicate => "duplicate",
            RowStatus::Conflict => "conflict",
            RowStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One imported row keyed by destination field name
///
/// An empty string means "no value". The natural key is never blank and
/// cannot be changed after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    key_field: String,
    data: BTreeMap<String, String>,
    resolved: bool,
}

impl DataEntry {
    /// Create an unresolved entry, rejecting a missing or blank key
    pub fn new(key_field: &str, data: BTreeMap<String, String>) -> Result<Self> {
        match data.get(key_field) {
            Some(key) if !key.trim().is_empty() => Ok(Self {
                key_field: key_field.to_string(),
                data,
                resolved: false,
            }),
            _ => Err(ImportError::validation(format!(
                "natural key '{}' is blank",
                key_field
            ))),
        }
    }

    /// Build an entry from one parsed row using a finalized mapping.
    /// `row_idx` is zero-based; errors report the source line of the row.
    pub fn from_row(
        mapping: &FieldMapping,
        table: &ParsedTable,
        row_idx: usize,
        key_field: &str,
    ) -> Result<Self> {
        let line = table.line(row_idx);
        let row = table
            .rows()
            .get(row_idx)
            .ok_or_else(|| ImportError::row_validation(line, "row does not exist"))?;

        let mut data = BTreeMap::new();
        for (source, destination) in mapping.pairs() {
            let value = table
                .column_index(source)
                .and_then(|idx| row.get(idx))
                .cloned()
                .unwrap_or_default();
            data.insert(destination.to_string(), value);
        }

        Self::new(key_field, data).map_err(|e| match e {
            ImportError::Validation { reason, .. } => ImportError::row_validation(line, reason),
            other => other,
        })
    }

    /// Entry produced by a completed merge
    pub(crate) fn resolved_from(key_field: &str, data: BTreeMap<String, String>) -> Self {
        Self {
            key_field: key_field.to_string(),
            data,
            resolved: true,
        }
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn key(&self) -> &str {
        self.get(&self.key_field)
    }

    /// Value of a field, "" when absent
    pub fn get(&self, field: &str) -> &str {
        self.data.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Values to write to storage; empty strings become NULL
    pub fn to_record(&self) -> Record {
        self.data
            .iter()
            .map(|(k, v)| {
                let value = if v.is_empty() { None } else { Some(v.clone()) };
                (k.clone(), value)
            })
            .collect()
    }
}
