//! Input classification and input file loading

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};

/// What kind of identifier a line of input holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Address,
    Id,
    Url,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InputKind::Address => "address",
            InputKind::Id => "zpid",
            InputKind::Url => "url",
        };
        f.write_str(label)
    }
}

/// A classified line of input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputRecord {
    /// The line exactly as it was given
    pub raw: String,
    pub kind: InputKind,
    /// Trimmed value the kind was derived from
    pub value: String,
}

/// Classify a raw line as an address, zpid, or URL
pub fn classify(raw: &str) -> Result<InputRecord> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ScrapeError::EmptyInput);
    }

    let kind = if has_url_scheme(value) {
        InputKind::Url
    } else if value.chars().all(|c| c.is_ascii_digit()) {
        InputKind::Id
    } else {
        InputKind::Address
    };

    debug!(input = value, %kind, "classified input");
    Ok(InputRecord {
        raw: raw.to_string(),
        kind,
        value: value.to_string(),
    })
}

fn has_url_scheme(value: &str) -> bool {
    let prefix: String = value.chars().take(8).collect::<String>().to_ascii_lowercase();
    prefix.starts_with("http://") || prefix.starts_with("https://")
}

/// Classify every meaningful line of an input listing.
/// Blank lines and `#` comments are skipped.
pub fn parse_input_lines(text: &str) -> Vec<InputRecord> {
    let mut records = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match classify(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = idx + 1, input = trimmed, error = %e, "skipping invalid input"),
        }
    }

    records
}

/// Load and classify inputs from a newline-delimited file
pub fn load_inputs(path: &Path) -> Result<Vec<InputRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ScrapeError::Io(std::io::Error::new(
            e.kind(),
            format!("input file {}: {}", path.display(), e),
        ))
    })?;

    let records = parse_input_lines(&text);
    if records.is_empty() {
        return Err(ScrapeError::NoInputs(path.display().to_string()));
    }
    info!("Loaded {} valid inputs from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classify_url_case_insensitive() {
        assert_eq!(classify("https://www.zillow.com/homedetails/1_zpid/").unwrap().kind, InputKind::Url);
        assert_eq!(classify("HTTP://example.com").unwrap().kind, InputKind::Url);
        assert_eq!(classify("HttpS://example.com/listing/99").unwrap().kind, InputKind::Url);
    }

    #[test]
    fn test_classify_id() {
        let record = classify("  2077364017 ").unwrap();
        assert_eq!(record.kind, InputKind::Id);
        assert_eq!(record.value, "2077364017");
        assert_eq!(record.raw, "  2077364017 ");
    }

    #[test]
    fn test_classify_address() {
        for text in ["1234 Example St", "12a", "12 34", "-5", "ftp://example.com", "http:/broken"] {
            assert_eq!(classify(text).unwrap().kind, InputKind::Address, "{}", text);
        }
    }

    #[test]
    fn test_classify_empty() {
        assert!(matches!(classify(""), Err(ScrapeError::EmptyInput)));
        assert!(matches!(classify("   \t"), Err(ScrapeError::EmptyInput)));
    }

    #[test]
    fn test_classify_unicode_digits_are_not_ids() {
        // Arabic-Indic digits are numeric but not ASCII
        assert_eq!(classify("١٢٣").unwrap().kind, InputKind::Address);
    }

    #[test]
    fn test_parse_input_lines_skips_blank_and_comments() {
        let text = "1234 Example St\n# comment\n\n   \nhttps://example.com/listing/99\n";
        let records = parse_input_lines(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, InputKind::Address);
        assert_eq!(records[1].kind, InputKind::Url);
        assert_eq!(records[1].value, "https://example.com/listing/99");
    }

    #[test]
    fn test_load_inputs_without_valid_lines_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# only a comment\n\n   \n").unwrap();
        assert!(matches!(load_inputs(file.path()), Err(ScrapeError::NoInputs(_))));

        let empty = tempfile::NamedTempFile::new().unwrap();
        let err = load_inputs(empty.path()).unwrap_err();
        assert!(err.to_string().starts_with("No valid inputs found in"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_load_inputs_missing_file() {
        let err = load_inputs(Path::new("/definitely/not/here/inputs.txt")).unwrap_err();
        assert!(matches!(err, ScrapeError::Io(_)));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(InputKind::Id.to_string(), "zpid");
        assert_eq!(InputKind::Address.to_string(), "address");
    }
}
