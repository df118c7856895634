//! `ait tables` command - List tables and their columns

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cli::helpers::{open_project, open_store, render_grid};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Storage;

#[derive(clap::Args, Debug)]
pub struct TablesArgs {
    /// Only show this table
    pub table: Option<String>,
}

#[derive(Debug, Serialize)]
struct ColumnInfo {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

pub fn run(args: TablesArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let store = open_store(&project)?;

    let names = match args.table {
        Some(table) => vec![table],
        None => store.tables().map_err(|e| miette::miette!("{}", e))?,
    };

    let mut listing: BTreeMap<String, Vec<ColumnInfo>> = BTreeMap::new();
    for name in names {
        let columns = store
            .columns(&name)
            .map_err(|e| miette::miette!("{}", e))?
            .into_iter()
            .map(|c| ColumnInfo {
                name: c.name,
                field_type: c.field_type.to_string(),
            })
            .collect();
        listing.insert(name, columns);
    }

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listing).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&listing).into_diagnostic()?);
        }
        OutputFormat::Tsv => {
            for (table, columns) in &listing {
                for column in columns {
                    println!("{}\t{}\t{}", table, column.name, column.field_type);
                }
            }
        }
        OutputFormat::Auto => {
            for (table, columns) in &listing {
                println!("{}", style(table).bold());
                let rows: Vec<Vec<String>> = columns
                    .iter()
                    .map(|c| vec![c.name.clone(), c.field_type.clone()])
                    .collect();
                println!("{}", render_grid(&["Column", "Type"], &rows));
                println!();
            }
        }
    }

    Ok(())
}
