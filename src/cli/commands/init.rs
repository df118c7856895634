//! `ait init` command - Initialize a new inventory project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::core::project::{Project, ProjectError};
use crate::core::Storage;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Reinitialize even if .ait/ already exists (records are kept)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    match Project::init(&path, args.force) {
        Ok(project) => {
            println!(
                "{} Initialized inventory project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );

            let store = crate::cli::helpers::open_store(&project)?;
            let tables = store.tables().map_err(|e| miette::miette!("{}", e))?;
            println!();
            println!("Tables: {}", style(tables.join(", ")).cyan());
            println!();
            println!("Next steps:");
            println!(
                "  {} Import a spreadsheet",
                style("ait import devices.xlsx").yellow()
            );
            println!(
                "  {} List tables and columns",
                style("ait tables").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} Inventory project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("ait init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
