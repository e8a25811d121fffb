//! zscrape - property listing scraper CLI

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use zscrape::cli::{Cli, Commands};
use zscrape::error::Result;

mod commands;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red(), e);
        if let Some(hint) = e.hint() {
            eprintln!("  {}", hint.dimmed());
        }
        std::process::exit(1);
    }
}

/// RUST_LOG wins; otherwise -v is info, -vv debug, default warn
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            settings,
            input,
            output,
            format,
            rate_limit,
            concurrency,
        } => commands::cmd_run(commands::RunArgs {
            settings,
            input,
            output,
            format,
            rate_limit,
            concurrency,
        }),

        Commands::Plan { settings, input, json } => commands::cmd_plan(settings, input, json),

        Commands::Parse { file, input, url } => commands::cmd_parse(&file, input, url),
    }
}
