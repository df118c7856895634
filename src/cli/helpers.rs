//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::GlobalOpts;
use crate::core::{Config, Project, SqliteStore};

/// Locate the project from --project or the current directory
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Load configuration for a known project
pub fn load_config(project: &Project) -> Config {
    Config::load_with(Config::global_config_path().as_deref(), Some(project))
}

/// Open the project's inventory database
pub fn open_store(project: &Project) -> Result<SqliteStore> {
    SqliteStore::open(project).map_err(|e| miette::miette!("{}", e))
}

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Render a header and rows as a rounded text grid
pub fn render_grid<S: AsRef<str>>(header: &[S], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(header.iter().map(|h| h.as_ref().to_string()));
    for row in rows {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::rounded()).to_string()
}
