//! Source column to destination field mapping
//!
//! Headers and field names are compared after normalization (lowercase,
//! without whitespace, hyphens or underscores), so "Serial Number",
//! "serial_number" and "SerialNumber" all map to one another.

use std::collections::BTreeMap;
use tracing::debug;

use crate::core::store::FieldType;
use crate::import::error::{ImportError, Result};

/// Normalize a header or field name for matching
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// A one-to-one mapping between source columns and destination fields,
/// plus fields the user asked to create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    /// destination field -> source column
    by_destination: BTreeMap<String, String>,
    new_fields: BTreeMap<String, FieldType>,
}

impl FieldMapping {
    /// Map `source` to `destination`. Any previous use of either side is
    /// dropped first so the mapping stays one-to-one.
    pub fn assign(&mut self, destination: &str, source: &str) {
        self.by_destination.retain(|_, s| s != source);
        self.by_destination
            .insert(destination.to_string(), source.to_string());
    }

    /// Leave a destination unmapped, returning its previous source
    pub fn clear(&mut self, destination: &str) -> Option<String> {
        self.by_destination.remove(destination)
    }

    pub fn source_for(&self, destination: &str) -> Option<&str> {
        self.by_destination.get(destination).map(String::as_str)
    }

    pub fn destination_for(&self, source: &str) -> Option<&str> {
        self.by_destination
            .iter()
            .find(|(_, s)| s.as_str() == source)
            .map(|(d, _)| d.as_str())
    }

    /// (source, destination) pairs ordered by destination name
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_destination
            .iter()
            .map(|(d, s)| (s.as_str(), d.as_str()))
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.by_destination.keys().map(String::as_str)
    }

    /// Fields to create in the destination table, with their types
    pub fn new_fields(&self) -> &BTreeMap<String, FieldType> {
        &self.new_fields
    }

    pub fn len(&self) -> usize {
        self.by_destination.len()
    }

    /// True when no column is mapped
    pub fn is_empty(&self) -> bool {
        self.by_destination.is_empty()
    }
}

/// Propose a mapping by normalized name
///
/// Destination fields are visited in order; each takes the first source
/// header (in source order) with the same normalized name that no earlier
/// field has taken. Fields without a match stay unmapped.
pub fn propose_mapping(source_headers: &[String], destination_fields: &[String]) -> FieldMapping {
    let normalized_sources: Vec<String> = source_headers.iter().map(|h| normalize(h)).collect();
    let mut mapping = FieldMapping::default();

    for destination in destination_fields {
        let target = normalize(destination);
        let found = source_headers
            .iter()
            .zip(&normalized_sources)
            .find(|(source, norm)| **norm == target && mapping.destination_for(source).is_none());

        if let Some((source, _)) = found {
            debug!(source = %source, destination = %destination, "auto-mapped column");
            mapping.assign(destination, source);
        }
    }

    mapping
}

/// An interactive mapping session over one file and one destination table
#[derive(Debug, Clone)]
pub struct MappingSession {
    source_headers: Vec<String>,
    destinations: Vec<String>,
    mapping: FieldMapping,
}

impl MappingSession {
    /// Open a session with the automatic proposal already applied
    pub fn new(source_headers: &[String], destination_fields: &[String]) -> Self {
        Self {
            source_headers: source_headers.to_vec(),
            destinations: destination_fields.to_vec(),
            mapping: propose_mapping(source_headers, destination_fields),
        }
    }

    pub fn source_headers(&self) -> &[String] {
        &self.source_headers
    }

    /// Destination fields, including any defined in this session
    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// The mapping as it currently stands
    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Set (`Some`) or clear (`None`) the source column of one destination
    pub fn assign(&mut self, destination: &str, source: Option<&str>) -> Result<()> {
        if !self.destinations.iter().any(|d| d == destination) {
            return Err(ImportError::validation(format!(
                "unknown destination field '{}'",
                destination
            )));
        }

        match source {
            Some(source) => {
                if !self.source_headers.iter().any(|h| h == source) {
                    return Err(ImportError::validation(format!(
                        "unknown source column '{}'",
                        source
                    )));
                }
                self.mapping.assign(destination, source);
            }
            None => {
                self.mapping.clear(destination);
            }
        }
        Ok(())
    }

    /// Define a new destination field
    ///
    /// The field becomes available for later assignments. Existing
    /// assignments are left exactly as they are.
    pub fn define_field(&mut self, name: &str, field_type: FieldType) -> Result<()> {
        if name.trim().is_empty() || name.contains('\0') {
            return Err(ImportError::validation("new field name is blank"));
        }

        let normalized = normalize(name);
        if let Some(existing) = self
            .destinations
            .iter()
            .find(|d| *d == name || normalize(d) == normalized)
        {
            return Err(ImportError::validation(format!(
                "field '{}' clashes with existing field '{}'",
                name, existing
            )));
        }

        debug!(field = name, %field_type, "defined new field");
        self.destinations.push(name.to_string());
        self.mapping.new_fields.insert(name.to_string(), field_type);
        Ok(())
    }

    /// Finish the session and keep its mapping
    pub fn confirm(self) -> FieldMapping {
        self.mapping
    }

    /// Abandon the session; nothing it accumulated is kept
    pub fn cancel(self) -> FieldMapping {
        FieldMapping::default()
    }
}
