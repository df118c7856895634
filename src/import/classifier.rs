//! Row classification against existing records

use tracing::debug;

use crate::core::store::{record_value, Record};
use crate::import::entry::{DataEntry, RowStatus};
use crate::import::error::Result;

/// Classifies imported rows by comparing them with the stored record that
/// shares their natural key
#[derive(Debug, Clone)]
pub struct RowClassifier {
    key_field: String,
}

impl RowClassifier {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
        }
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Classify an entry against the record found for its key, if any
    ///
    /// Only the entry's mapped fields are compared; extra columns of the
    /// stored record never cause a conflict. A resolved entry stays
    /// resolved for as long as its record exists.
    pub fn classify(&self, entry: &DataEntry, existing: Option<&Record>) -> RowStatus {
        let status = match existing {
            None => RowStatus::New,
            Some(_) if entry.is_resolved() => RowStatus::Resolved,
            Some(record) if differing_fields(entry, record).is_empty() => RowStatus::Duplicate,
            Some(_) => RowStatus::Conflict,
        };
        debug!(key = entry.key(), %status, "classified row");
        status
    }

    /// Classify an entry, looking up its existing record by natural key
    pub fn classify_with<F>(&self, entry: &DataEntry, lookup: F) -> Result<RowStatus>
    where
        F: FnOnce(&str) -> Result<Option<Record>>,
    {
        let existing = lookup(entry.key())?;
        Ok(self.classify(entry, existing.as_ref()))
    }
}

/// Mapped fields whose value differs from the stored record.
/// NULL, "" and a missing column all compare equal.
pub fn differing_fields<'a>(entry: &'a DataEntry, existing: &Record) -> Vec<&'a str> {
    entry
        .data()
        .iter()
        .filter(|(field, value)| value.as_str() != record_value(existing, field))
        .map(|(field, _)| field.as_str())
        .collect()
}
