//! Core module - project layout, configuration and storage

pub mod config;
pub mod project;
pub mod store;

pub use config::Config;
pub use project::{Project, ProjectError};
pub use store::{Column, FieldType, Record, SqliteStore, Storage, StoreError};
