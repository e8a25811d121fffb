//! Commands that never touch the network: plan, parse

use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;

use zscrape::config::Settings;
use zscrape::error::Result;
use zscrape::extract::extract_property;
use zscrape::input::{classify, load_inputs, InputKind};
use zscrape::normalize::normalize;
use zscrape::resolve::resolve_url;

#[derive(Serialize)]
struct PlannedItem<'a> {
    input: &'a str,
    kind: InputKind,
    url: String,
}

/// Show how each input would be classified and which URL would be fetched
pub fn cmd_plan(settings: Option<PathBuf>, input: Option<PathBuf>, json: bool) -> Result<()> {
    let mut settings = Settings::load(settings.as_deref());
    if input.is_some() {
        settings.input_file = input;
    }
    let input_path = settings.input_path();
    let inputs = load_inputs(&input_path)?;

    let planned: Vec<PlannedItem> = inputs
        .iter()
        .map(|record| PlannedItem {
            input: &record.value,
            kind: record.kind,
            url: resolve_url(record, &settings.base_url),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    println!("\n{} inputs from {}\n", planned.len(), input_path.display());
    for (i, item) in planned.iter().enumerate() {
        println!(
            "  {:>3}. {:<8} {}",
            i + 1,
            item.kind.to_string().cyan(),
            item.input
        );
        println!("       {}", item.url.dimmed());
    }
    println!();

    Ok(())
}

/// Extract a property from a saved page and print the normalized record
pub fn cmd_parse(file: &Path, input: Option<String>, url: Option<String>) -> Result<()> {
    let html = std::fs::read_to_string(file)?;

    let label = input
        .or_else(|| url.clone())
        .unwrap_or_else(|| file.display().to_string());
    let record = classify(&label)?;
    let page_url = url.unwrap_or_else(|| resolve_url(&record, &Settings::default().base_url));

    let property = extract_property(&html, &record, &page_url);
    let normalized = normalize(&property.to_raw_map(), &record.raw, &page_url);

    println!("{}", serde_json::to_string_pretty(&normalized)?);
    Ok(())
}
