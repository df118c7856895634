//! `ait show` command - Display one record by natural key

use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{load_config, open_project, open_store, render_grid};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Storage;

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Table to read from
    pub table: String,

    /// Natural key value of the record
    pub key: String,

    /// Natural key column (default: from config, then AssetName)
    #[arg(long)]
    pub key_field: Option<String>,
}

pub fn run(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let config = load_config(&project);
    let store = open_store(&project)?;
    let key_field = args.key_field.unwrap_or_else(|| config.key_field());

    let record = store
        .fetch(&args.table, &key_field, &args.key)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| {
            miette::miette!(
                "No record in {} with {} '{}'",
                args.table,
                key_field,
                args.key
            )
        })?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&record).into_diagnostic()?);
        }
        OutputFormat::Tsv => {
            for (field, value) in &record {
                println!("{}\t{}", field, value.as_deref().unwrap_or(""));
            }
        }
        OutputFormat::Auto => {
            let rows: Vec<Vec<String>> = record
                .iter()
                .map(|(field, value)| vec![field.clone(), value.clone().unwrap_or_default()])
                .collect();
            println!("{}", render_grid(&["Field", "Value"], &rows));
        }
    }

    Ok(())
}
