//! `ait bulk` command - Bulk operations on records

use clap::Subcommand;
use console::style;
use miette::Result;
use tracing::warn;

use crate::cli::helpers::{load_config, open_project, open_store};
use crate::cli::GlobalOpts;
use crate::core::{Record, Storage};

#[derive(Subcommand, Debug)]
pub enum BulkCommands {
    /// Set one field on several records selected by natural key
    Set(SetArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Table holding the records
    pub table: String,

    /// Field to change
    pub field: String,

    /// New value (an empty string clears the field)
    pub value: String,

    /// Natural key values of the records to update
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Natural key column (default: from config, then AssetName)
    #[arg(long)]
    pub key_field: Option<String>,

    /// Show what would change without making changes
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(cmd: BulkCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        BulkCommands::Set(args) => run_set(args, global),
    }
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let config = load_config(&project);
    let mut store = open_store(&project)?;
    let key_field = args.key_field.unwrap_or_else(|| config.key_field());

    if args.field == key_field {
        return Err(miette::miette!(
            "Cannot bulk-set the natural key column '{}'",
            key_field
        ));
    }

    let columns = store
        .columns(&args.table)
        .map_err(|e| miette::miette!("{}", e))?;
    if !columns.iter().any(|c| c.name == args.field) {
        return Err(miette::miette!(
            "Table {} has no column '{}'",
            args.table,
            args.field
        ));
    }

    let value = if args.value.is_empty() {
        None
    } else {
        Some(args.value.clone())
    };
    let values = Record::from([(args.field.clone(), value)]);

    let mut updated = 0;
    let mut failed = 0;

    for key in &args.keys {
        let outcome = store
            .fetch(&args.table, &key_field, key)
            .map_err(|e| e.to_string())
            .and_then(|found| match found {
                None => Err("record not found".to_string()),
                Some(_) if args.dry_run => Ok(()),
                Some(_) => store
                    .update(&args.table, &key_field, key, &values)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
            });

        match outcome {
            Ok(()) => {
                updated += 1;
                if !global.quiet {
                    println!(
                        "{} {} {} = {}",
                        style(if args.dry_run { "→" } else { "✓" }).green(),
                        style(key).cyan(),
                        args.field,
                        style(&args.value).yellow()
                    );
                }
            }
            Err(reason) => {
                failed += 1;
                warn!(key = %key, reason = %reason, "bulk update failed");
                eprintln!("{} {}: {}", style("✗").red(), style(key).cyan(), reason);
            }
        }
    }

    if !global.quiet {
        println!();
        if args.dry_run {
            println!(
                "{} Would update {} record(s)",
                style("→").blue(),
                style(updated).cyan()
            );
        } else {
            println!(
                "{} Updated {} record(s)",
                style("✓").green(),
                style(updated).cyan()
            );
        }
    }

    if failed > 0 {
        return Err(miette::miette!("{} record(s) could not be updated", failed));
    }
    Ok(())
}
