use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::input::{InputKind, InputRecord};
use crate::normalize::clean_text;

static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[#,/]").expect("Invalid separator regex")
});

static UNSAFE_CHARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^0-9a-zA-Z\s-]").expect("Invalid unsafe chars regex")
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("Invalid whitespace regex")
});

/// Build the page URL to fetch for a classified input.
///
/// URLs pass through untouched, zpids map to the detail page and addresses
/// map to the search page for their slug.
pub fn resolve_url(record: &InputRecord, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');

    let url = match record.kind {
        InputKind::Url => record.value.clone(),
        InputKind::Id => format!("{}/homedetails/{}_zpid/", base, record.value),
        InputKind::Address => format!("{}/homes/{}_rb/", base, slugify_address(&record.value)),
    };

    debug!(input = %record.value, kind = %record.kind, %url, "resolved url");
    url
}

/// Turn an address into a path-safe slug.
///
/// "7254 Wisteria Ln, Lake Wales, FL 33898" -> "7254-Wisteria-Ln-Lake-Wales-FL-33898"
pub fn slugify_address(address: &str) -> String {
    let text = clean_text(address);
    let text = SEPARATOR_RE.replace_all(&text, " ");
    let text = UNSAFE_CHARS_RE.replace_all(&text, "");
    let text = WHITESPACE_RE.replace_all(text.trim(), "-");
    text.trim_matches('-').to_string()
}
