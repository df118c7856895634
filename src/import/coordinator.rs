//! Import session state machine
//!
//! One coordinator drives one import into one destination table:
//!
//! ```text
//! Idle -> FileLoaded -> Mapped -> Reviewing (<-> resolve_row) -> Committed
//! ```
//!
//! Every transition is an explicit method call. Failures are reported in
//! the status line and leave the working set as it was before the call.

use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::core::store::{Column, FieldType, Storage};
use crate::import::classifier::RowClassifier;
use crate::import::entry::{DataEntry, RowStatus};
use crate::import::error::{ImportError, Result};
use crate::import::mapper::{FieldMapping, MappingSession};
use crate::import::reader::{ParsedTable, ReadOutcome, TabularFileReader};
use crate::import::resolver::{ChoicePrompt, ConflictResolver, Resolution};

/// Where an import session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    FileLoaded,
    Mapped,
    Reviewing,
    Committed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::FileLoaded => "waiting for a column mapping",
            SessionState::Mapped => "mapped",
            SessionState::Reviewing => "reviewing",
            SessionState::Committed => "committed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified row in the working set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    line: usize,
    entry: DataEntry,
    status: RowStatus,
}

impl ReviewRow {
    /// Line of the source file this row came from (header is line 1)
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn entry(&self) -> &DataEntry {
        &self.entry
    }

    pub fn status(&self) -> RowStatus {
        self.status
    }
}

/// A source row excluded before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

/// A row the backend refused during commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub line: usize,
    pub key: String,
    pub reason: String,
}

/// Result of loading a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { rows: usize, columns: usize },
    /// Header present but no data rows; nothing was loaded
    Empty,
}

/// Result of applying a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOutcome {
    Mapped,
    /// The mapping was empty; the import was cancelled
    Aborted,
}

/// Row counts of the working set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    pub new: usize,
    pub duplicate: usize,
    pub conflict: usize,
    pub resolved: usize,
    pub rejected: usize,
    /// Columns added to (or, in a dry run, planned for) the destination
    pub added_columns: Vec<Column>,
}

/// Outcome of a commit attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub inserted: usize,
    pub updated: usize,
    /// Conflicting rows written with their imported values
    pub unresolved: usize,
    pub skipped_duplicates: usize,
    pub failures: Vec<RowFailure>,
}

/// Drives an import into one table keyed by one natural key column
pub struct ImportCoordinator<S: Storage> {
    store: S,
    table: String,
    key_field: String,
    reader: TabularFileReader,
    classifier: RowClassifier,
    resolver: ConflictResolver,
    dry_run: bool,

    state: SessionState,
    parsed: Option<ParsedTable>,
    schema: Vec<Column>,
    mapping: FieldMapping,
    rows: Vec<ReviewRow>,
    rejected: Vec<RejectedRow>,
    status_line: String,
}

impl<S: Storage> ImportCoordinator<S> {
    pub fn new(store: S, table: impl Into<String>, key_field: impl Into<String>) -> Self {
        let key_field = key_field.into();
        Self {
            store,
            table: table.into(),
            classifier: RowClassifier::new(key_field.clone()),
            resolver: ConflictResolver::new(key_field.clone()),
            key_field,
            reader: TabularFileReader::default(),
            dry_run: false,
            state: SessionState::Idle,
            parsed: None,
            schema: Vec::new(),
            mapping: FieldMapping::default(),
            rows: Vec::new(),
            rejected: Vec::new(),
            status_line: String::new(),
        }
    }

    /// Use a configured file reader
    pub fn with_reader(mut self, reader: TabularFileReader) -> Self {
        self.reader = reader;
        self
    }

    /// Classify without changing the schema; commit is refused
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn parsed(&self) -> Option<&ParsedTable> {
        self.parsed.as_ref()
    }

    /// Destination columns as last read from (or added to) the backend
    pub fn schema(&self) -> &[Column] {
        &self.schema
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn rows(&self) -> &[ReviewRow] {
        &self.rows
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Last status message
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// True while a loaded file has not been committed or discarded
    pub fn has_unsaved_work(&self) -> bool {
        matches!(
            self.state,
            SessionState::FileLoaded | SessionState::Mapped | SessionState::Reviewing
        )
    }

    /// Indexes of rows still in conflict
    pub fn conflict_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.status == RowStatus::Conflict)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Row counts by status
    pub fn summary(&self) -> ClassifySummary {
        let mut summary = ClassifySummary {
            rejected: self.rejected.len(),
            ..Default::default()
        };
        for row in &self.rows {
            match row.status {
                RowStatus::New => summary.new += 1,
                RowStatus::Duplicate => summary.duplicate += 1,
                RowStatus::Conflict => summary.conflict += 1,
                RowStatus::Resolved => summary.resolved += 1,
            }
        }
        summary
    }

    /// Drop the whole working set and return to idle
    pub fn discard(&mut self) {
        self.reset();
        self.report("Import discarded");
    }

    /// Read a file into a fresh session
    pub fn load_file(&mut self, path: &Path) -> Result<LoadOutcome> {
        if self.has_unsaved_work() {
            self.report("Current import has unsaved rows; discard it first");
            return Err(ImportError::UnsavedSession);
        }

        let outcome = match self.reader.read(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read import file");
                self.report(format!("Could not read {}: {}", path.display(), e));
                return Err(e);
            }
        };

        match outcome {
            ReadOutcome::HeaderOnly(_) => {
                self.report(format!("{} has no data rows", path.display()));
                Ok(LoadOutcome::Empty)
            }
            ReadOutcome::Table(table) => {
                self.reset();
                let loaded = LoadOutcome::Loaded {
                    rows: table.len(),
                    columns: table.header().len(),
                };
                self.parsed = Some(table);
                self.state = SessionState::FileLoaded;
                info!(path = %path.display(), table = %self.table, "file loaded");
                self.report(format!("Loaded {}", path.display()));
                Ok(loaded)
            }
        }
    }

    /// Read the destination schema and open a mapping session over it
    pub fn begin_mapping(&mut self) -> Result<MappingSession> {
        self.require(&[SessionState::FileLoaded, SessionState::Mapped], "map columns")?;

        let columns = match self.store.columns(&self.table) {
            Ok(columns) => columns,
            Err(e) => {
                let err = ImportError::schema(&self.table, e);
                self.report(err.to_string());
                return Err(err);
            }
        };
        self.schema = columns;

        let destinations: Vec<String> = self.schema.iter().map(|c| c.name.clone()).collect();
        let header = self
            .parsed
            .as_ref()
            .map(|p| p.header().to_vec())
            .unwrap_or_default();
        Ok(MappingSession::new(&header, &destinations))
    }

    /// Accept the result of a mapping session
    ///
    /// An empty mapping cancels the import and returns to idle.
    pub fn apply_mapping(&mut self, mapping: FieldMapping) -> Result<MappingOutcome> {
        self.require(&[SessionState::FileLoaded, SessionState::Mapped], "apply a mapping")?;

        if mapping.is_empty() {
            self.reset();
            info!(table = %self.table, "import cancelled at mapping");
            self.report("Import cancelled: no columns mapped");
            return Ok(MappingOutcome::Aborted);
        }

        if mapping.source_for(&self.key_field).is_none() {
            let err = ImportError::validation(format!(
                "no column is mapped to the natural key '{}'",
                self.key_field
            ));
            self.report(err.to_string());
            return Err(err);
        }

        if let Some(parsed) = &self.parsed {
            if let Some((source, _)) = mapping
                .pairs()
                .find(|(source, _)| parsed.column_index(source).is_none())
            {
                let err = ImportError::validation(format!(
                    "source column '{}' is not in the file",
                    source
                ));
                self.report(err.to_string());
                return Err(err);
            }
        }

        self.mapping = mapping;
        self.state = SessionState::Mapped;
        info!(columns = self.mapping.len(), "mapping applied");
        self.report(format!("{} column(s) mapped", self.mapping.len()));
        Ok(MappingOutcome::Mapped)
    }

    /// Columns the mapping needs that the destination does not have yet
    pub fn planned_columns(&self) -> Vec<Column> {
        let exists = |name: &str| self.schema.iter().any(|c| c.name == name);

        let mut planned: Vec<Column> = self
            .mapping
            .new_fields()
            .iter()
            .filter(|(name, _)| !exists(name))
            .map(|(name, ty)| Column::new(name.clone(), *ty))
            .collect();

        for destination in self.mapping.destinations() {
            if !exists(destination) && !self.mapping.new_fields().contains_key(destination) {
                planned.push(Column::new(destination, FieldType::Text));
            }
        }
        planned
    }

    /// Evolve the schema, then build and classify every parsed row
    pub fn classify_all(&mut self) -> Result<ClassifySummary> {
        self.require(&[SessionState::Mapped], "classify rows")?;

        let planned = self.planned_columns();
        if !self.dry_run {
            for column in &planned {
                if let Err(e) = self
                    .store
                    .add_column(&self.table, &column.name, column.field_type)
                {
                    let err = ImportError::schema(&self.table, e);
                    warn!(column = %column.name, error = %err, "failed to add column");
                    self.report(err.to_string());
                    return Err(err);
                }
                info!(table = %self.table, column = %column.name, field_type = %column.field_type, "added column");
                self.schema.push(column.clone());
            }
        }

        let Some(parsed) = self.parsed.as_ref() else {
            return Err(ImportError::InvalidState {
                state: self.state,
                action: "classify rows",
            });
        };

        let mut rows = Vec::with_capacity(parsed.len());
        let mut rejected = Vec::new();

        for idx in 0..parsed.len() {
            let entry = match DataEntry::from_row(&self.mapping, parsed, idx, &self.key_field) {
                Ok(entry) => entry,
                Err(ImportError::Validation { row, reason }) => {
                    let line = row.unwrap_or_else(|| parsed.line(idx));
                    warn!(line, reason = %reason, "row rejected");
                    rejected.push(RejectedRow { line, reason });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let existing = match self.store.fetch(&self.table, &self.key_field, entry.key()) {
                Ok(existing) => existing,
                Err(e) => {
                    let err = ImportError::from(e);
                    self.report(err.to_string());
                    return Err(err);
                }
            };

            let status = self.classifier.classify(&entry, existing.as_ref());
            rows.push(ReviewRow {
                line: parsed.line(idx),
                entry,
                status,
            });
        }

        self.rows = rows;
        self.rejected = rejected;
        self.state = SessionState::Reviewing;

        let summary = ClassifySummary {
            added_columns: planned,
            ..self.summary()
        };
        info!(
            new = summary.new,
            duplicate = summary.duplicate,
            conflict = summary.conflict,
            rejected = summary.rejected,
            "rows classified"
        );
        self.report(format!(
            "{} new, {} duplicate, {} conflicting, {} rejected",
            summary.new, summary.duplicate, summary.conflict, summary.rejected
        ));
        Ok(summary)
    }

    /// Resolve one conflicting row interactively
    ///
    /// The stored record is fetched again, so the new status reflects the
    /// database as it is now. A cancelled prompt leaves the row unchanged.
    pub fn resolve_row<P>(&mut self, index: usize, prompt: &mut P) -> Result<RowStatus>
    where
        P: ChoicePrompt + ?Sized,
    {
        self.require(&[SessionState::Reviewing], "resolve a row")?;

        let (line, status, key) = match self.rows.get(index) {
            Some(row) => (row.line, row.status, row.entry.key().to_string()),
            None => {
                return Err(ImportError::validation(format!("no row at index {}", index)));
            }
        };
        if status != RowStatus::Conflict {
            return Err(ImportError::row_validation(
                line,
                format!("row is {}; only conflicting rows can be resolved", status),
            ));
        }

        let existing = match self.store.fetch(&self.table, &self.key_field, &key) {
            Ok(existing) => existing,
            Err(e) => {
                let err = ImportError::from(e);
                self.report(err.to_string());
                return Err(err);
            }
        };

        let resolution = match &existing {
            Some(record) => match self.resolver.resolve(&self.rows[index].entry, record, prompt) {
                Ok(resolution) => Some(resolution),
                Err(err) => {
                    warn!(line, error = %err, "conflict resolution failed");
                    self.report(err.to_string());
                    return Err(err);
                }
            },
            None => None,
        };

        let row = &mut self.rows[index];
        if let Some(Resolution::Resolved(entry)) = resolution {
            row.entry = entry;
        }
        row.status = self.classifier.classify(&row.entry, existing.as_ref());

        let status = row.status;
        self.report(format!("Row {} is {}", line, status));
        Ok(status)
    }

    /// Remove duplicate rows from the working set
    pub fn drop_duplicates(&mut self) -> Result<usize> {
        self.require(&[SessionState::Reviewing], "drop duplicates")?;
        let before = self.rows.len();
        self.rows.retain(|row| row.status != RowStatus::Duplicate);
        let dropped = before - self.rows.len();
        self.report(format!("Dropped {} duplicate row(s)", dropped));
        Ok(dropped)
    }

    /// Write every non-duplicate row
    ///
    /// New rows are inserted; conflicting and resolved rows are upserted by
    /// natural key. Conflicting rows are written with their imported values.
    /// Each row is attempted even if earlier rows failed. Rows that were
    /// written leave the working set; failed rows stay so commit can be
    /// run again.
    pub fn commit(&mut self) -> Result<CommitReport> {
        self.require(&[SessionState::Reviewing], "commit")?;
        if self.dry_run {
            return Err(ImportError::validation("dry run: nothing is written"));
        }

        let mut report = CommitReport::default();
        let mut remaining = Vec::new();

        for row in std::mem::take(&mut self.rows) {
            let values = row.entry.to_record();
            let key = row.entry.key();

            let written = match row.status {
                RowStatus::Duplicate => {
                    report.skipped_duplicates += 1;
                    continue;
                }
                RowStatus::New => self
                    .store
                    .insert(&self.table, &values)
                    .map(|_| report.inserted += 1),
                RowStatus::Conflict | RowStatus::Resolved => {
                    match self.store.update(&self.table, &self.key_field, key, &values) {
                        Ok(0) => self
                            .store
                            .insert(&self.table, &values)
                            .map(|_| report.inserted += 1),
                        Ok(_) => {
                            report.updated += 1;
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            match written {
                Ok(()) => {
                    if row.status == RowStatus::Conflict {
                        report.unresolved += 1;
                    }
                }
                Err(e) => {
                    warn!(line = row.line, key, error = %e, "row failed to commit");
                    report.failures.push(RowFailure {
                        line: row.line,
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                    remaining.push(row);
                }
            }
        }

        self.rows = remaining;

        if report.failures.is_empty() {
            self.parsed = None;
            self.rejected.clear();
            self.state = SessionState::Committed;
            info!(
                table = %self.table,
                inserted = report.inserted,
                updated = report.updated,
                "import committed"
            );
            self.report(format!(
                "Committed: {} inserted, {} updated",
                report.inserted, report.updated
            ));
        } else {
            self.report(format!(
                "{} row(s) failed to commit; {} inserted, {} updated",
                report.failures.len(),
                report.inserted,
                report.updated
            ));
        }

        Ok(report)
    }

    fn require(&self, allowed: &[SessionState], action: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ImportError::InvalidState {
                state: self.state,
                action,
            })
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.parsed = None;
        self.schema.clear();
        self.mapping = FieldMapping::default();
        self.rows.clear();
        self.rejected.clear();
    }

    fn report(&mut self, message: impl Into<String>) {
        self.status_line = message.into();
    }
}
