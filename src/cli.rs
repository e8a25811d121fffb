use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::OutputFormat;

#[derive(Parser)]
#[command(name = "zscrape")]
#[command(author, version, about = "Scrape property listings into JSON or CSV", long_about = None)]
#[command(after_help = r#"Examples:
  zscrape run -i inputs.txt -o out/properties.json     Scrape every input line
  zscrape run -i inputs.txt -o out/properties.csv      Format guessed from extension
  zscrape run -s settings.json -f both -vv             Settings file, debug logging
  zscrape plan -i inputs.txt                           Show resolved URLs, no network
  zscrape parse saved_page.html --input 12345          Extract from a saved page

Input file:
  One address, zpid or listing URL per line. Blank lines and lines
  starting with # are ignored.
"#)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape every input and write the results
    #[command(after_help = r#"Examples:
  zscrape run -i inputs.txt -o properties.json
  zscrape run -i inputs.txt -o properties -f both     # properties.json + properties.csv
  zscrape run -i inputs.txt --rate-limit 0.5          # one request every 2 seconds
  zscrape run -i inputs.txt --concurrency 4
"#)]
    Run {
        /// Settings file (JSON, or TOML with a .toml extension)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Newline-delimited input file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (default: guessed from the output extension)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Requests per second across all workers (0 disables throttling)
        #[arg(long)]
        rate_limit: Option<f64>,

        /// Number of inputs processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Classify inputs and show the URLs that would be fetched
    Plan {
        /// Settings file, for the base URL
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Newline-delimited input file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract a property from a saved HTML page and print it as JSON
    Parse {
        /// Saved HTML page
        #[arg(value_name = "HTML_FILE")]
        file: PathBuf,

        /// Input the page was fetched for (address, zpid or URL)
        #[arg(long)]
        input: Option<String>,

        /// URL the page was fetched from
        #[arg(long)]
        url: Option<String>,
    },
}
