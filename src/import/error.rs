//! Error taxonomy for the import pipeline

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::store::StoreError;
use crate::import::coordinator::SessionState;

/// Errors raised while reading, mapping, classifying or committing an import
#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    /// The input file could not be read or holds no header row
    #[error("cannot read {path:?}: {reason}")]
    #[diagnostic(
        code(ait::import::file_format),
        help("supported formats: .csv, .txt, .xlsx, .xlsm, .xlsb, .xls, .ods")
    )]
    FileFormat { path: PathBuf, reason: String },

    /// Destination columns could not be listed or created
    #[error("schema error on table '{table}': {reason}")]
    #[diagnostic(code(ait::import::schema))]
    Schema { table: String, reason: String },

    /// A storage operation failed
    #[error("backend error: {0}")]
    #[diagnostic(code(ait::import::backend))]
    Backend(#[from] StoreError),

    /// Input rejected before any state change
    #[error("{}", describe_validation(.row, .reason))]
    #[diagnostic(code(ait::import::validation))]
    Validation { row: Option<usize>, reason: String },

    /// Operation not allowed in the current session state
    #[error("cannot {action} while the import session is {state}")]
    #[diagnostic(code(ait::import::invalid_state))]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },

    /// A new file was loaded over rows that have not been committed
    #[error("the current import session has unsaved rows")]
    #[diagnostic(
        code(ait::import::unsaved_session),
        help("discard the current session before loading another file")
    )]
    UnsavedSession,
}

impl ImportError {
    pub fn validation(reason: impl Into<String>) -> Self {
        ImportError::Validation {
            row: None,
            reason: reason.into(),
        }
    }

    pub fn row_validation(row: usize, reason: impl Into<String>) -> Self {
        ImportError::Validation {
            row: Some(row),
            reason: reason.into(),
        }
    }

    pub fn schema(table: &str, reason: impl ToString) -> Self {
        ImportError::Schema {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn describe_validation(row: &Option<usize>, reason: &str) -> String {
    match row {
        Some(row) => format!("row {}: {}", row, reason),
        None => reason.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
