//! Fallback extraction over visible page text
//!
//! Used when a page has no usable script data block. Every field is recovered
//! independently by pattern matching; a miss only blanks that one field.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};

use crate::normalize::clean_text;
use crate::property::Measure;

/// Characters of context kept before a postal code
const ADDRESS_WINDOW_CHARS: usize = 80;

/// Elements whose text never renders
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Checked in order; the first case-insensitive hit wins
const PROPERTY_TYPES: [&str; 5] = [
    "Single Family",
    "Condo",
    "Townhouse",
    "Multi Family",
    "Apartment",
];

static POSTAL_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{5}(?:-\d{4})?\s*(?:USA|United States)?").expect("Invalid postal code regex")
});

static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)zpid["']?\s*[:=]\s*["']?(\d+)"#).expect("Invalid zpid regex")
});

static ZESTIMATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Zestimate[^0-9]*\$?\s*(\d[\d,]*)").expect("Invalid zestimate regex")
});

static BEDS_RE: Lazy<Regex> = Lazy::new(|| feature_regex("bd"));
static BATHS_RE: Lazy<Regex> = Lazy::new(|| feature_regex("ba"));
static SQFT_RE: Lazy<Regex> = Lazy::new(|| feature_regex("sqft"));

static BUILT_IN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)built\s+in\s+(19[5-9]\d|20[0-4]\d)\b").expect("Invalid built-in regex")
});

static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(19[5-9]\d|20[0-4]\d)\b").expect("Invalid year regex")
});

/// Number directly followed by a unit suffix, e.g. "2.5 ba" or "1,800 sqft"
fn feature_regex(suffix: &str) -> Regex {
    Regex::new(&format!(
        r"(?i)(\d[\d,]*(?:\.\d+)?)\s*{}\b",
        regex::escape(suffix)
    ))
    .expect("Invalid feature regex")
}

/// Fields the heuristic strategy can recover
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeuristicFields {
    pub address: Option<String>,
    pub id: Option<String>,
    pub valuation_estimate: Option<i64>,
    pub bedrooms: Option<Measure>,
    pub bathrooms: Option<Measure>,
    pub living_area: Option<Measure>,
    pub year_built: Option<i64>,
    pub property_type: Option<String>,
}

/// Recover what we can from a page without a structured payload.
/// Lot size and price history are never available on this path.
pub fn extract_heuristic(markup: &str) -> HeuristicFields {
    let document = Html::parse_document(markup);
    let text = flatten_text(&document);

    HeuristicFields {
        address: address_from_landmarks(&document).or_else(|| address_near_postal_code(&text)),
        id: listing_id(&text).or_else(|| listing_id(&script_text(&document))),
        valuation_estimate: valuation_after_label(&text),
        bedrooms: numeric_feature(&text, &BEDS_RE),
        bathrooms: numeric_feature(&text, &BATHS_RE),
        living_area: numeric_feature(&text, &SQFT_RE),
        year_built: year_built(&text),
        property_type: property_type(&text),
    }
}

/// Visible text nodes, trimmed, joined with single spaces.
/// Script, style, noscript and template bodies are left out.
pub fn flatten_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter(|node| !node.ancestors().any(|a| is_hidden(a.value())))
        .filter_map(|node| node.value().as_text().map(|t| t.trim()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_hidden(node: &Node) -> bool {
    node.as_element()
        .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
}

/// Script bodies only; the listing id is often set in inline scripts
fn script_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("script") else {
        return String::new();
    };
    document
        .select(&selector)
        .map(|script| script.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

fn listing_id(text: &str) -> Option<String> {
    ID_RE.captures(text).map(|c| c[1].to_string())
}

/// og:title meta tag, then the first h1
fn address_from_landmarks(document: &Html) -> Option<String> {
    if let Ok(selector) = Selector::parse(r#"meta[property="og:title"]"#) {
        let og_title = document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(clean_text)
            .find(|content| !content.is_empty());
        if og_title.is_some() {
            return og_title;
        }
    }

    let selector = Selector::parse("h1").ok()?;
    let h1 = document.select(&selector).next()?;
    let text = clean_text(&h1.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

/// Up to 80 characters before the first postal code, through the code itself
pub fn address_near_postal_code(text: &str) -> Option<String> {
    let found = POSTAL_CODE_RE.find(text)?;
    let start = text[..found.start()]
        .char_indices()
        .rev()
        .take(ADDRESS_WINDOW_CHARS)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(found.start());

    let snippet = text[start..found.end()].trim();
    (!snippet.is_empty()).then(|| snippet.to_string())
}

fn valuation_after_label(text: &str) -> Option<i64> {
    let caps = ZESTIMATE_RE.captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

/// Number preceding a unit suffix; decimals stay fractional
pub fn numeric_feature(text: &str, pattern: &Regex) -> Option<Measure> {
    let caps = pattern.captures(text)?;
    let raw = caps[1].replace(',', "");
    if raw.contains('.') {
        raw.parse().ok().map(Measure::Fractional)
    } else {
        raw.parse().ok().map(Measure::Whole)
    }
}

/// "Built in YYYY" when labelled, else the first plausible bare year
fn year_built(text: &str) -> Option<i64> {
    BUILT_IN_RE
        .captures(text)
        .or_else(|| YEAR_RE.captures(text))
        .and_then(|caps| caps[1].parse().ok())
}

fn property_type(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    PROPERTY_TYPES
        .iter()
        .find(|candidate| lower.contains(&candidate.to_lowercase()))
        .map(|candidate| candidate.to_string())
}
