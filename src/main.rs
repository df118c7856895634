use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use ait::cli::helpers::{load_config, open_project};
use ait::cli::{Cli, Commands, GlobalOpts};
use ait::core::Config;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    match cli.command {
        Commands::Init(args) => ait::cli::commands::init::run(args),
        Commands::Import(args) => ait::cli::commands::import::run(args, &global),
        Commands::Tables(args) => ait::cli::commands::tables::run(args, &global),
        Commands::Show(args) => ait::cli::commands::show::run(args, &global),
        Commands::Bulk(cmd) => ait::cli::commands::bulk::run(cmd, &global),
        Commands::Completions(args) => ait::cli::commands::completions::run(args),
    }
}

/// Log to stderr. RUST_LOG wins, then --verbose, then the configured filter.
fn init_logging(global: &GlobalOpts) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if global.verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::try_new(logging_config(global).log_filter())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Configuration of the project named by --project, or the one around the
/// working directory. Outside a project only global settings apply.
fn logging_config(global: &GlobalOpts) -> Config {
    match open_project(global) {
        Ok(project) => load_config(&project),
        Err(_) => Config::load_with(Config::global_config_path().as_deref(), None),
    }
}
