//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::store::{SqliteStore, StoreError};

/// Directory holding project configuration and the inventory database
const PROJECT_DIR: &str = ".ait";

/// Database file name inside the project directory
const DATABASE_FILE: &str = "inventory.db";

/// Represents an inventory project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .ait/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at the given path
    ///
    /// With `force`, an existing .ait/ is reused: the config file is
    /// rewritten and missing default tables are created. Existing records
    /// are kept.
    pub fn init(path: &Path, force: bool) -> Result<Self, ProjectError> {
        let root = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        let ait_dir = root.join(PROJECT_DIR);
        if ait_dir.exists() && !force {
            return Err(ProjectError::AlreadyExists(root.clone()));
        }

        std::fs::create_dir_all(&ait_dir)
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(ait_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        let project = Self { root };
        let store = SqliteStore::open(&project)?;
        store.init_schema()?;

        Ok(project)
    }

    fn default_config() -> &'static str {
        r#"# Asset Inventory Toolkit project configuration

# Table that `ait import` writes to when --table is not given
# default_table: Computers

# Natural key column used to match imported rows to existing records
# key_field: AssetName

# Delimiter for CSV input (no quoting support)
# csv_delimiter: ","

# Format for date cells read from spreadsheets (chrono strftime syntax)
# date_format: "%Y-%m-%d"

# Log filter (error, warn, info, debug, trace or a tracing directive)
# log: warn
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .ait configuration directory
    pub fn ait_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Get the path of the inventory database
    pub fn database_path(&self) -> PathBuf {
        self.ait_dir().join(DATABASE_FILE)
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not an inventory project (searched from {searched_from:?}). Run 'ait init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("inventory project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("database error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Storage;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path(), false).unwrap();

        assert!(project.ait_dir().exists());
        assert!(project.ait_dir().join("config.yaml").exists());
        assert!(project.database_path().exists());

        let store = SqliteStore::open(&project).unwrap();
        assert!(store.tables().unwrap().contains(&"Computers".to_string()));
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path(), false).unwrap();

        let err = Project::init(tmp.path(), false).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
    }

    #[test]
    fn test_project_init_force_keeps_records() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path(), false).unwrap();
        {
            let store = SqliteStore::open(&project).unwrap();
            store
                .execute_batch("INSERT INTO Computers (AssetName) VALUES ('PC1');")
                .unwrap();
        }

        let project = Project::init(tmp.path(), true).unwrap();
        let store = SqliteStore::open(&project).unwrap();
        assert!(store.fetch("Computers", "AssetName", "PC1").unwrap().is_some());
    }

    #[test]
    fn test_project_discover_finds_ait_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path(), false).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(project.root(), tmp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_project_discover_fails_outside_project() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }
}
