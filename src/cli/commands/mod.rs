//! CLI command implementations

pub mod bulk;
pub mod completions;
pub mod import;
pub mod init;
pub mod show;
pub mod tables;
