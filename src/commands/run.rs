//! The scrape command: load inputs, run the batch, export

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use tracing::{info, warn};

use zscrape::batch::Batch;
use zscrape::config::{OutputFormat, Settings, SettingsOverrides};
use zscrape::error::{Result, ScrapeError};
use zscrape::export::export_records;
use zscrape::fetch::{PageFetcher, RateLimiter};
use zscrape::input::load_inputs;

/// Options given on the command line; each one beats the settings file
pub struct RunArgs {
    pub settings: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub rate_limit: Option<f64>,
    pub concurrency: Option<usize>,
}

impl RunArgs {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            input_file: self.input.clone(),
            output_file: self.output.clone(),
            output_format: self.format,
            rate_limit_per_second: self.rate_limit,
            concurrency: self.concurrency,
            ..Default::default()
        }
    }
}

/// Scrape every input and write the results
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let settings = Settings::load(args.settings.as_deref()).merged(args.overrides());

    let input_path = settings.input_path();
    let output_path = settings.output_path();
    let format = settings.effective_format(&output_path);

    info!("Using input file: {}", input_path.display());
    info!("Using output file: {}", output_path.display());
    info!("Output format: {}", format);

    let inputs = load_inputs(&input_path)?;

    // Ctrl+C finishes in-flight items and skips the rest
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping after in-flight items...");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| ScrapeError::Config(format!("Failed to set Ctrl+C handler: {}", e)))?;

    let fetcher = PageFetcher::new(settings.fetch_config());
    let report = Batch::new(&fetcher, &settings.base_url)
        .with_rate_limiter(RateLimiter::per_second(settings.rate_limit_per_second))
        .with_concurrency(settings.concurrency)
        .with_cancel_flag(&cancel)
        .run(&inputs);

    if report.cancelled {
        println!(
            "{} after {} of {} inputs",
            "Interrupted".yellow(),
            report.processed(),
            inputs.len()
        );
    }

    for (index, input, error) in report.failures() {
        println!("  {} [{}] {}: {}", "✗".red(), index + 1, input.value, error);
        if let Some(hint) = error.hint() {
            println!("    {}", hint.dimmed());
        }
    }

    let records = report.normalized();
    println!(
        "Processed {} inputs, successfully resolved {} properties.",
        report.processed(),
        records.len()
    );

    if records.is_empty() {
        warn!("No properties resolved successfully, nothing to export");
        println!("{}", "Nothing to export.".yellow());
        return Ok(());
    }

    let written = export_records(&records, &output_path, format)?;
    for path in written {
        println!("Output written to: {}", path.display().to_string().green());
    }

    Ok(())
}
