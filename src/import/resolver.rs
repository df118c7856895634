//! Field-level merge of a conflicting row

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::core::store::{record_value, Record};
use crate::import::classifier::differing_fields;
use crate::import::entry::DataEntry;
use crate::import::error::{ImportError, Result};

/// Which value to keep for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    /// Keep the stored value
    Old,
    /// Take the imported value
    #[default]
    New,
}

/// One field presented to the user during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict {
    pub field: String,
    pub old: String,
    pub new: String,
    /// The choice is fixed to [`Side::New`] (the natural key)
    pub locked: bool,
}

/// Outcome of a resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(DataEntry),
    Cancelled,
}

/// Asks the user to pick a side for each presented field
pub trait ChoicePrompt {
    /// Return one side per conflict, in order, or `None` to cancel
    fn choose(&mut self, key: &str, conflicts: &[FieldConflict]) -> Option<Vec<Side>>;
}

impl<F> ChoicePrompt for F
where
    F: FnMut(&str, &[FieldConflict]) -> Option<Vec<Side>>,
{
    fn choose(&mut self, key: &str, conflicts: &[FieldConflict]) -> Option<Vec<Side>> {
        self(key, conflicts)
    }
}

/// Merges an imported row with the stored record it conflicts with
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    key_field: String,
}

impl ConflictResolver {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
        }
    }

    /// Fields to present: the locked natural key first, then every mapped
    /// field whose value differs from the stored record
    pub fn conflicts(&self, entry: &DataEntry, existing: &Record) -> Vec<FieldConflict> {
        let mut conflicts = vec![FieldConflict {
            field: self.key_field.clone(),
            old: record_value(existing, &self.key_field).to_string(),
            new: entry.key().to_string(),
            locked: true,
        }];

        conflicts.extend(
            differing_fields(entry, existing)
                .into_iter()
                .filter(|field| *field != self.key_field)
                .map(|field| FieldConflict {
                    field: field.to_string(),
                    old: record_value(existing, field).to_string(),
                    new: entry.get(field).to_string(),
                    locked: false,
                }),
        );
        conflicts
    }

    /// Build the merged entry from explicit choices
    ///
    /// Fields without a choice, fields that do not differ and the natural
    /// key all take the imported value.
    pub fn merge(
        &self,
        entry: &DataEntry,
        existing: &Record,
        choices: &BTreeMap<String, Side>,
    ) -> DataEntry {
        let data = entry
            .data()
            .iter()
            .map(|(field, new_value)| {
                let keep_old = *field != self.key_field
                    && choices.get(field).copied().unwrap_or_default() == Side::Old;
                let value = if keep_old {
                    record_value(existing, field).to_string()
                } else {
                    new_value.clone()
                };
                (field.clone(), value)
            })
            .collect();

        DataEntry::resolved_from(entry.key_field(), data)
    }

    /// Present the conflicts of one row and merge according to the answer
    pub fn resolve<P>(
        &self,
        entry: &DataEntry,
        existing: &Record,
        prompt: &mut P,
    ) -> Result<Resolution>
    where
        P: ChoicePrompt + ?Sized,
    {
        let conflicts = self.conflicts(entry, existing);

        let Some(sides) = prompt.choose(entry.key(), &conflicts) else {
            info!(key = entry.key(), "resolution cancelled");
            return Ok(Resolution::Cancelled);
        };

        if sides.len() != conflicts.len() {
            return Err(ImportError::validation(format!(
                "expected {} choices for '{}', got {}",
                conflicts.len(),
                entry.key(),
                sides.len()
            )));
        }

        let choices: BTreeMap<String, Side> = conflicts
            .iter()
            .zip(sides)
            .map(|(conflict, side)| {
                let side = if conflict.locked { Side::New } else { side };
                debug!(field = %conflict.field, ?side, "field choice");
                (conflict.field.clone(), side)
            })
            .collect();

        info!(key = entry.key(), "row resolved");
        Ok(Resolution::Resolved(self.merge(entry, existing, &choices)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pairs: &[(&str, &str)]) -> DataEntry {
        let data: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DataEntry::new("AssetName", data).unwrap()
    }

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(String::from)))
            .collect()
    }

    #[test]
    fn test_conflicts_lists_key_then_differences() {
        let resolver = ConflictResolver::new("AssetName");
        let e = entry(&[("AssetName", "PC1"), ("Model", "T480"), ("OS", "Win11")]);
        let existing = record(&[
            ("AssetName", Some("PC1")),
            ("Model", Some("T480")),
            ("OS", Some("Win10")),
        ]);

        let conflicts = resolver.conflicts(&e, &existing);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].field, "AssetName");
        assert!(conflicts[0].locked);
        assert_eq!(
            conflicts[1],
            FieldConflict {
                field: "OS".to_string(),
                old: "Win10".to_string(),
                new: "Win11".to_string(),
                locked: false,
            }
        );
    }

    #[test]
    fn test_resolve_scenario_pick_new() {
        let resolver = ConflictResolver::new("AssetName");
        let e = entry(&[("AssetName", "PC1"), ("OS", "Win11")]);
        let existing = record(&[("AssetName", Some("PC1")), ("OS", Some("Win10"))]);

        let mut prompt =
            |_: &str, conflicts: &[FieldConflict]| Some(vec![Side::New; conflicts.len()]);
        let resolution = resolver.resolve(&e, &existing, &mut prompt).unwrap();

        let Resolution::Resolved(merged) = resolution else {
            panic!("expected resolution");
        };
        assert!(merged.is_resolved());
        assert_eq!(merged.get("AssetName"), "PC1");
        assert_eq!(merged.get("OS"), "Win11");
    }

    #[test]
    fn test_resolve_mixed_choices() {
        let resolver = ConflictResolver::new("AssetName");
        let e = entry(&[
            ("AssetName", "PC1"),
            ("Location", "HQ"),
            ("Model", "T490"),
            ("OS", "Win11"),
        ]);
        let existing = record(&[
            ("AssetName", Some("PC1")),
            ("Location", Some("HQ")),
            ("Model", Some("T480")),
            ("OS", None),
        ]);

        // Presented: AssetName (locked), Model, OS
        let mut prompt = |_: &str, _: &[FieldConflict]| {
            Some(vec![Side::Old, Side::Old, Side::New])
        };
        let Resolution::Resolved(merged) = resolver.resolve(&e, &existing, &mut prompt).unwrap()
        else {
            panic!("expected resolution");
        };

        assert_eq!(merged.get("AssetName"), "PC1");
        assert_eq!(merged.get("Model"), "T480");
        assert_eq!(merged.get("OS"), "Win11");
        assert_eq!(merged.get("Location"), "HQ");
    }

    #[test]
    fn test_keep_old_null_becomes_empty() {
        let resolver = ConflictResolver::new("AssetName");
        let e = entry(&[("AssetName", "PC1"), ("OS", "Win11")]);
        let existing = record(&[("AssetName", Some("PC1")), ("OS", None)]);

        let choices = BTreeMap::from([("OS".to_string(), Side::Old)]);
        let merged = resolver.merge(&e, &existing, &choices);
        assert_eq!(merged.get("OS"), "");
    }

    #[test]
    fn test_key_cannot_be_switched_to_old() {
        let resolver = ConflictResolver::new("AssetName");
        let e = entry(&[("AssetName", "PC1"), ("OS", "Win11")]);
        // A snapshot whose key differs only to prove the locked choice wins
        let existing = record(&[("AssetName", Some("pc1")), ("OS", Some("Win10"))]);

        let choices = BTreeMap::from([("AssetName".to_string(), Side::Old)]);
        assert_eq!(resolver.merge(&e, &existing, &choices).key(), "PC1");

        let mut prompt = |_: &str, c: &[FieldConflict]| Some(vec![Side::Old; c.len()]);
        let Resolution::Resolved(merged) = resolver.resolve(&e, &existing, &mut prompt).unwrap()
        else {
            panic!("expected resolution");
        };
        assert_eq!(merged.key(), "PC1");
        assert_eq!(merged.get("OS"), "Win10");
    }

    #[test]
    fn test_cancel_returns_cancelled() {
        let resolver = ConflictResolver::new("AssetName");
        let e = entry(&[("AssetName", "PC1"), ("OS", "Win11")]);
        let existing = record(&[("AssetName", Some("PC1")), ("OS", Some("Win10"))]);

        let mut prompt = |_: &str, _: &[FieldConflict]| -> Option<Vec<Side>> { None };
        assert_eq!(
            resolver.resolve(&e, &existing, &mut prompt).unwrap(),
            Resolution::Cancelled
        );
    }

    #[test]
    fn test_wrong_number_of_choices() {
        let resolver = ConflictResolver::new("AssetName");
        let e = entry(&[("AssetName", "PC1"), ("OS", "Win11")]);
        let existing = record(&[("AssetName", Some("PC1")), ("OS", Some("Win10"))]);

        let mut prompt = |_: &str, _: &[FieldConflict]| Some(vec![Side::New]);
        let err = resolver.resolve(&e, &existing, &mut prompt).unwrap_err();
        assert!(matches!(err, ImportError::Validation { .. }));
    }
}
