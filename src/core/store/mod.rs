//! SQLite-backed inventory store
//!
//! This module provides the storage collaborator used by the import
//! pipeline and the record commands:
//! - Lists tables and their declared column types
//! - Adds columns when an import introduces new fields
//! - Fetches, inserts and updates records by natural key
//!
//! User columns are declared TEXT and their field types are kept in a
//! registry table, so stored values come back exactly as written.
//!
//! All values travel as bound parameters. Table and column names cannot be
//! bound, so they are checked and quoted before being placed in a statement.

mod queries;
mod schema;
mod types;

pub use types::*;

use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

use crate::core::project::Project;

/// Storage operations consumed by the import pipeline
pub trait Storage {
    /// Names of all user tables
    fn tables(&self) -> Result<Vec<String>, StoreError>;

    /// Columns of a table in declaration order
    fn columns(&self, table: &str) -> Result<Vec<Column>, StoreError>;

    /// Add a column with a declared type
    fn add_column(&mut self, table: &str, name: &str, field_type: FieldType)
        -> Result<(), StoreError>;

    /// Fetch the record whose `key_field` equals `key`
    fn fetch(&self, table: &str, key_field: &str, key: &str)
        -> Result<Option<Record>, StoreError>;

    /// Insert a new record
    fn insert(&mut self, table: &str, values: &Record) -> Result<(), StoreError>;

    /// Update the record whose `key_field` equals `key`, returning the
    /// number of rows touched
    fn update(
        &mut self,
        table: &str,
        key_field: &str,
        key: &str,
        values: &Record,
    ) -> Result<usize, StoreError>;
}

/// Errors raised by the storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// The inventory database
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database file of a project
    pub fn open(project: &Project) -> Result<Self, StoreError> {
        Self::open_path(&project.database_path())
    }

    /// Open (or create) a database file at `path`
    pub fn open_path(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self { conn };
        store.init_registry()?;
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_registry()?;
        Ok(store)
    }

    /// Run a batch of statements (schema setup, fixtures)
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

/// Quote a table or column name for use in a statement
pub(crate) fn quote_ident(name: &str) -> Result<String, StoreError> {
    if name.trim().is_empty() || name.contains('\0') {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
