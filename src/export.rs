//! Writing normalized records to JSON and CSV files

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::config::OutputFormat;
use crate::error::Result;
use crate::normalize::NormalizedRecord;

/// Write records as a pretty-printed JSON array
pub fn export_json(records: &[NormalizedRecord], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Write records as CSV. The header comes from the first record's keys;
/// `price_history` is embedded as a JSON string.
pub fn export_csv(records: &[NormalizedRecord], path: &Path) -> Result<()> {
    ensure_parent(path)?;

    if records.is_empty() {
        warn!("No records to write, creating empty {}", path.display());
        fs::write(path, "")?;
        return Ok(());
    }

    let rows = records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let header: Vec<String> = match rows.first() {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };

    let mut out = String::new();
    push_row(&mut out, header.iter().map(|k| k.as_str().into()));

    for row in &rows {
        let cells = header.iter().map(|key| cell_text(row.get(key).unwrap_or(&Value::Null)));
        push_row(&mut out, cells);
    }

    fs::write(path, out)?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Write `records` in `format`. `Both` writes `<stem>.json` and `<stem>.csv`
/// next to each other. Returns the files written.
pub fn export_records(
    records: &[NormalizedRecord],
    path: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    match format {
        OutputFormat::Json => {
            export_json(records, path)?;
            Ok(vec![path.to_path_buf()])
        }
        OutputFormat::Csv => {
            export_csv(records, path)?;
            Ok(vec![path.to_path_buf()])
        }
        OutputFormat::Both => {
            let json_path = path.with_extension("json");
            let csv_path = path.with_extension("csv");
            export_json(records, &json_path)?;
            export_csv(records, &csv_path)?;
            Ok(vec![json_path, csv_path])
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let line: Vec<String> = cells.map(|c| quote_cell(&c)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// RFC 4180 quoting: wrap when the cell holds a delimiter, quote or line break
fn quote_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
