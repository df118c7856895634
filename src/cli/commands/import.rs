//! `ait import` command - Import a spreadsheet into an inventory table
//!
//! The command is a thin terminal front end over [`ImportCoordinator`]:
//! preview, mapping form, classification table, per-row conflict
//! resolution and commit.

use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::warn;

use crate::cli::helpers::{load_config, open_project, open_store, render_grid, truncate_str};
use crate::cli::GlobalOpts;
use crate::core::{FieldType, Storage};
use crate::import::{
    ChoicePrompt, CommitReport, FieldConflict, FieldMapping, ImportCoordinator, LoadOutcome,
    MappingOutcome, MappingSession, ParsedTable, RowStatus, Side, TabularFileReader,
};

/// Rows shown in the file preview
const PREVIEW_ROWS: usize = 5;

/// Rows listed in the classification table before eliding
const LISTED_ROWS: usize = 50;

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// CSV or spreadsheet file to import
    pub file: PathBuf,

    /// Destination table (default: from config, then Computers)
    #[arg(long, short = 't')]
    pub table: Option<String>,

    /// Natural key column (default: from config, then AssetName)
    #[arg(long)]
    pub key: Option<String>,

    /// Accept the proposed mapping and commit without resolving conflicts
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Classify rows and stop; nothing is written
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    if !args.yes && !Term::stdout().is_term() {
        return Err(miette::miette!(
            "Interactive import needs a terminal. Use --yes to accept the proposed mapping"
        ));
    }

    let project = open_project(global)?;
    let config = load_config(&project);
    let store = open_store(&project)?;

    let table = args.table.clone().unwrap_or_else(|| config.default_table());
    let key_field = args.key.clone().unwrap_or_else(|| config.key_field());
    let reader = TabularFileReader::new(config.csv_delimiter(), config.date_format())?;

    let mut coordinator = ImportCoordinator::new(store, table, key_field)
        .with_reader(reader)
        .with_dry_run(args.dry_run);

    println!(
        "{} Importing {} into {}{}",
        style("→").blue(),
        style(args.file.display()).yellow(),
        style(coordinator.table()).cyan(),
        if args.dry_run { style(" (dry run)").dim().to_string() } else { String::new() }
    );
    println!();

    match coordinator.load_file(&args.file)? {
        LoadOutcome::Empty => {
            println!("{} {}", style("!").yellow(), coordinator.status_line());
            return Ok(());
        }
        LoadOutcome::Loaded { rows, columns } => {
            println!(
                "{} Read {} row(s), {} column(s)",
                style("✓").green(),
                style(rows).cyan(),
                style(columns).cyan()
            );
        }
    }

    if !global.quiet {
        if let Some(parsed) = coordinator.parsed() {
            print_preview(parsed);
        }
    }

    let session = coordinator.begin_mapping()?;
    let mapping = if args.yes {
        print_mapping(&session);
        session.confirm()
    } else {
        edit_mapping(session)?
    };

    if coordinator.apply_mapping(mapping)? == MappingOutcome::Aborted {
        println!("{} {}", style("!").yellow(), coordinator.status_line());
        return Ok(());
    }

    let summary = coordinator.classify_all()?;

    for column in &summary.added_columns {
        println!(
            "{} {} column {} ({})",
            style("+").green(),
            if args.dry_run { "Would add" } else { "Added" },
            style(&column.name).cyan(),
            column.field_type
        );
    }
    for rejected in coordinator.rejected() {
        println!(
            "{} Row {} skipped: {}",
            style("✗").red(),
            rejected.line,
            rejected.reason
        );
    }
    if !global.quiet {
        print_rows(&coordinator);
    }

    println!();
    println!(
        "  {} new, {} duplicate, {} conflicting, {} rejected",
        style(summary.new).green(),
        style(summary.duplicate).dim(),
        style(summary.conflict).yellow(),
        style(summary.rejected).red()
    );

    if args.dry_run {
        println!();
        println!("{}", style("Dry run complete. Nothing was written.").yellow());
        return Ok(());
    }

    if !args.yes && !review(&mut coordinator)? {
        coordinator.discard();
        println!("{} {}", style("!").yellow(), coordinator.status_line());
        return Ok(());
    }

    let report = coordinator.commit()?;
    print_report(&report);

    if !report.failures.is_empty() {
        return Err(miette::miette!(
            "{} row(s) failed to commit",
            report.failures.len()
        ));
    }
    Ok(())
}

/// First rows of the file as read
fn print_preview(parsed: &ParsedTable) {
    let rows: Vec<Vec<String>> = parsed
        .rows()
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| row.iter().map(|cell| truncate_str(cell, 24)).collect())
        .collect();

    println!();
    println!("{}", style("Preview").bold());
    println!("{}", render_grid(parsed.header(), &rows));
    if parsed.len() > PREVIEW_ROWS {
        println!("{}", style(format!("... {} more row(s)", parsed.len() - PREVIEW_ROWS)).dim());
    }
    println!();
}

fn print_mapping(session: &MappingSession) {
    let mapping = session.mapping();
    let rows: Vec<Vec<String>> = session
        .destinations()
        .iter()
        .map(|destination| {
            let source = mapping.source_for(destination).unwrap_or("-").to_string();
            let kind = match mapping.new_fields().get(destination) {
                Some(field_type) => format!("new ({})", field_type),
                None => String::new(),
            };
            vec![destination.clone(), source, kind]
        })
        .collect();

    println!("{}", style("Column mapping").bold());
    println!("{}", render_grid(&["Field", "Source column", ""], &rows));
    println!();
}

/// Mapping form: accept, change one field, define a field or cancel
fn edit_mapping(mut session: MappingSession) -> Result<FieldMapping> {
    let theme = ColorfulTheme::default();

    loop {
        print_mapping(&session);

        let actions = [
            "Accept mapping",
            "Change a field",
            "Define a new field",
            "Cancel import",
        ];
        let choice = Select::with_theme(&theme)
            .with_prompt("Mapping")
            .items(&actions)
            .default(0)
            .interact_opt()
            .into_diagnostic()?;

        match choice {
            Some(0) => return Ok(session.confirm()),
            Some(1) => {
                let destinations = session.destinations().to_vec();
                let Some(field) = Select::with_theme(&theme)
                    .with_prompt("Field")
                    .items(&destinations)
                    .interact_opt()
                    .into_diagnostic()?
                else {
                    continue;
                };

                let mut sources = vec!["(leave unmapped)".to_string()];
                sources.extend(session.source_headers().iter().cloned());
                let Some(source) = Select::with_theme(&theme)
                    .with_prompt(format!("Source column for {}", destinations[field]))
                    .items(&sources)
                    .default(0)
                    .interact_opt()
                    .into_diagnostic()?
                else {
                    continue;
                };

                let source = (source > 0).then(|| sources[source].as_str());
                if let Err(e) = session.assign(&destinations[field], source) {
                    println!("{} {}", style("✗").red(), e);
                }
            }
            Some(2) => {
                let name: String = Input::with_theme(&theme)
                    .with_prompt("Field name")
                    .interact_text()
                    .into_diagnostic()?;
                let types: Vec<&str> = FieldType::ALL.iter().map(FieldType::as_str).collect();
                let Some(field_type) = Select::with_theme(&theme)
                    .with_prompt("Type")
                    .items(&types)
                    .default(0)
                    .interact_opt()
                    .into_diagnostic()?
                else {
                    continue;
                };

                if let Err(e) = session.define_field(name.trim(), FieldType::ALL[field_type]) {
                    println!("{} {}", style("✗").red(), e);
                }
            }
            _ => return Ok(session.cancel()),
        }
    }
}

fn print_rows<S: Storage>(coordinator: &ImportCoordinator<S>) {
    let rows: Vec<Vec<String>> = coordinator
        .rows()
        .iter()
        .take(LISTED_ROWS)
        .map(|row| {
            vec![
                row.line().to_string(),
                row.entry().key().to_string(),
                row.status().to_string(),
            ]
        })
        .collect();

    println!();
    println!("{}", render_grid(&["Row", coordinator.key_field(), "Status"], &rows));
    if coordinator.rows().len() > LISTED_ROWS {
        println!(
            "{}",
            style(format!("... {} more row(s)", coordinator.rows().len() - LISTED_ROWS)).dim()
        );
    }
}

/// Resolve conflicts until the user commits or discards.
/// Returns false when the import should be discarded.
fn review<S: Storage>(coordinator: &mut ImportCoordinator<S>) -> Result<bool> {
    let theme = ColorfulTheme::default();
    let mut prompt = TerminalPrompt {
        theme: ColorfulTheme::default(),
    };

    loop {
        let conflicts = coordinator.conflict_rows();
        let mut items: Vec<String> = conflicts
            .iter()
            .map(|&idx| {
                let row = &coordinator.rows()[idx];
                format!("Resolve row {} ({})", row.line(), row.entry().key())
            })
            .collect();
        items.push("Commit".to_string());
        items.push("Discard import".to_string());

        let choice = Select::with_theme(&theme)
            .with_prompt(format!("{} conflicting row(s)", conflicts.len()))
            .items(&items)
            .default(if conflicts.is_empty() { items.len() - 2 } else { 0 })
            .interact_opt()
            .into_diagnostic()?;

        match choice {
            Some(i) if i < conflicts.len() => {
                let status = coordinator.resolve_row(conflicts[i], &mut prompt)?;
                let marker = if status == RowStatus::Conflict {
                    style("!").yellow()
                } else {
                    style("✓").green()
                };
                println!("{} {}", marker, coordinator.status_line());
            }
            Some(i) if i == conflicts.len() => {
                if !conflicts.is_empty() {
                    println!(
                        "{} {} unresolved row(s) will overwrite the stored values",
                        style("!").yellow(),
                        conflicts.len()
                    );
                }
                let confirmed = Confirm::with_theme(&theme)
                    .with_prompt(format!("Commit to {}?", coordinator.table()))
                    .default(true)
                    .interact()
                    .into_diagnostic()?;
                if confirmed {
                    return Ok(true);
                }
            }
            _ => {
                let discard = Confirm::with_theme(&theme)
                    .with_prompt("Discard all imported rows?")
                    .default(false)
                    .interact()
                    .into_diagnostic()?;
                if discard {
                    return Ok(false);
                }
            }
        }
    }
}

/// Old/new choice per differing field on the terminal
struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl ChoicePrompt for TerminalPrompt {
    fn choose(&mut self, key: &str, conflicts: &[FieldConflict]) -> Option<Vec<Side>> {
        println!();
        println!("{} {}", style("Resolving").bold(), style(key).cyan());

        let mut sides = Vec::with_capacity(conflicts.len());
        for conflict in conflicts {
            if conflict.locked {
                println!("  {} = {} (natural key)", conflict.field, conflict.new);
                sides.push(Side::New);
                continue;
            }

            let items = [
                format!("keep old: {}", display_value(&conflict.old)),
                format!("take new: {}", display_value(&conflict.new)),
            ];
            let answer = Select::with_theme(&self.theme)
                .with_prompt(&conflict.field)
                .items(&items)
                .default(1)
                .interact_opt();

            match answer {
                Ok(Some(0)) => sides.push(Side::Old),
                Ok(Some(_)) => sides.push(Side::New),
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "prompt failed; resolution cancelled");
                    return None;
                }
            }
        }
        Some(sides)
    }
}

fn display_value(value: &str) -> String {
    if value.is_empty() {
        "(empty)".to_string()
    } else {
        value.to_string()
    }
}

fn print_report(report: &CommitReport) {
    println!();
    println!("{}", style("─".repeat(50)).dim());
    println!("{}", style("Import Summary").bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  Inserted:         {}", style(report.inserted).green());
    println!("  Updated:          {}", style(report.updated).yellow());
    if report.skipped_duplicates > 0 {
        println!("  Duplicates:       {}", style(report.skipped_duplicates).dim());
    }
    if report.unresolved > 0 {
        println!(
            "  Overwritten:      {} {}",
            style(report.unresolved).yellow(),
            style("(conflicts committed without review)").dim()
        );
    }
    if !report.failures.is_empty() {
        println!("  Failed:           {}", style(report.failures.len()).red());
        for failure in &report.failures {
            println!(
                "    {} row {} ({}): {}",
                style("✗").red(),
                failure.line,
                failure.key,
                failure.reason
            );
        }
    }
}
