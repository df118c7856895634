//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::Project;

/// Natural key column used when nothing else is configured
pub const DEFAULT_KEY_FIELD: &str = "AssetName";

/// Destination table used when nothing else is configured
pub const DEFAULT_TABLE: &str = "Computers";

/// Date pattern for spreadsheet date cells
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Toolkit configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Table `ait import` writes to when --table is not given
    pub default_table: Option<String>,

    /// Natural key column for matching imported rows
    pub key_field: Option<String>,

    /// CSV field delimiter
    pub csv_delimiter: Option<char>,

    /// strftime pattern for spreadsheet date cells
    pub date_format: Option<String>,

    /// tracing filter directive
    pub log: Option<String>,
}

impl Config {
    /// Load configuration from an explicit global file and project,
    /// merging in priority order
    pub fn load_with(global_path: Option<&Path>, project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (accessor fallbacks)

        // 2. Global user config (~/.config/ait/config.yaml)
        if let Some(global) = global_path.and_then(Self::read_file) {
            config.merge(global);
        }

        // 3. Project config (.ait/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read_file(&project.ait_dir().join("config.yaml")) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        if let Ok(table) = std::env::var("AIT_TABLE") {
            config.default_table = Some(table);
        }
        if let Ok(key) = std::env::var("AIT_KEY_FIELD") {
            config.key_field = Some(key);
        }
        if let Ok(delimiter) = std::env::var("AIT_CSV_DELIMITER") {
            let mut chars = delimiter.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                config.csv_delimiter = Some(c);
            }
        }
        if let Ok(format) = std::env::var("AIT_DATE_FORMAT") {
            config.date_format = Some(format);
        }
        if let Ok(log) = std::env::var("AIT_LOG") {
            config.log = Some(log);
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        serde_yml::from_str::<Config>(&contents).ok()
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ait")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.default_table.is_some() {
            self.default_table = other.default_table;
        }
        if other.key_field.is_some() {
            self.key_field = other.key_field;
        }
        if other.csv_delimiter.is_some() {
            self.csv_delimiter = other.csv_delimiter;
        }
        if other.date_format.is_some() {
            self.date_format = other.date_format;
        }
        if other.log.is_some() {
            self.log = other.log;
        }
    }

    pub fn default_table(&self) -> String {
        self.default_table
            .clone()
            .unwrap_or_else(|| DEFAULT_TABLE.to_string())
    }

    pub fn key_field(&self) -> String {
        self.key_field
            .clone()
            .unwrap_or_else(|| DEFAULT_KEY_FIELD.to_string())
    }

    pub fn csv_delimiter(&self) -> char {
        self.csv_delimiter.unwrap_or(',')
    }

    pub fn date_format(&self) -> String {
        self.date_format
            .clone()
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string())
    }

    pub fn log_filter(&self) -> String {
        self.log.clone().unwrap_or_else(|| "warn".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_table(), "Computers");
        assert_eq!(config.key_field(), "AssetName");
        assert_eq!(config.csv_delimiter(), ',');
        assert_eq!(config.date_format(), "%Y-%m-%d");
        assert_eq!(config.log_filter(), "warn");
    }

    #[test]
    fn test_project_config_overrides_global() {
        let tmp = tempdir().unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(&global, "default_table: Routers\ncsv_delimiter: \";\"\n").unwrap();

        let project_dir = tmp.path().join("proj");
        std::fs::create_dir_all(&project_dir).unwrap();
        let project = Project::init(&project_dir, false).unwrap();
        std::fs::write(
            project.ait_dir().join("config.yaml"),
            "default_table: Computers\ndate_format: \"%d/%m/%Y\"\n",
        )
        .unwrap();

        let config = Config::load_with(Some(&global), Some(&project));
        assert_eq!(config.default_table.as_deref(), Some("Computers"));
        assert_eq!(config.csv_delimiter, Some(';'));
        assert_eq!(config.date_format.as_deref(), Some("%d/%m/%Y"));
    }

    #[test]
    fn test_unparseable_layer_is_ignored() {
        let tmp = tempdir().unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(&global, "csv_delimiter: [not, a, char]\n").unwrap();

        let config = Config::load_with(Some(&global), None);
        assert!(config.csv_delimiter.is_none());
    }
}
