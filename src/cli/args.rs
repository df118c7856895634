//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    bulk::BulkCommands, completions::CompletionsArgs, import::ImportArgs, init::InitArgs,
    show::ShowArgs, tables::TablesArgs,
};

#[derive(Parser)]
#[command(name = "ait")]
#[command(author, version, about = "Asset Inventory Toolkit")]
#[command(long_about = "Import CSV and spreadsheet exports of IT hardware into a local inventory database, reconciling every row against the records already stored.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .ait/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new inventory project
    Init(InitArgs),

    /// Import a CSV or spreadsheet file into a table
    Import(ImportArgs),

    /// List tables and their columns
    Tables(TablesArgs),

    /// Show one record by natural key
    Show(ShowArgs),

    /// Bulk operations on records
    #[command(subcommand)]
    Bulk(BulkCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Output format for record and table listings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table on a terminal
    #[default]
    Auto,
    /// YAML format
    Yaml,
    /// JSON format (for programming)
    Json,
    /// Tab-separated values (for piping)
    Tsv,
}
