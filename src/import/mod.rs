//! Spreadsheet import pipeline
//!
//! Reads a CSV or spreadsheet file, maps its columns onto a destination
//! table, classifies every row against the stored records and commits the
//! reviewed result.

pub mod classifier;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod mapper;
pub mod reader;
pub mod resolver;

pub use classifier::{differing_fields, RowClassifier};
pub use coordinator::{
    ClassifySummary, CommitReport, ImportCoordinator, LoadOutcome, MappingOutcome, RejectedRow,
    ReviewRow, RowFailure, SessionState,
};
pub use entry::{DataEntry, RowStatus};
pub use error::{ImportError, Result};
pub use mapper::{normalize, propose_mapping, FieldMapping, MappingSession};
pub use reader::{ParsedTable, ReadOutcome, TabularFileReader};
pub use resolver::{ChoicePrompt, ConflictResolver, FieldConflict, Resolution, Side};
