use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Pre-compiled regex for whitespace normalization (compile once, use many times)
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("Invalid whitespace regex pattern")
});

static NULL: Value = Value::Null;

/// Output record with a fixed, total key set. Missing values serialize as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub address: Option<String>,
    pub id: Option<String>,
    pub url: Option<String>,
    pub valuation_estimate: Option<f64>,
    pub rent_estimate: Option<f64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub living_area: Option<i64>,
    pub lot_size: Option<i64>,
    pub year_built: Option<i64>,
    pub property_type: Option<String>,
    pub price: Option<i64>,
    pub status: Option<String>,
    pub price_history: Vec<Value>,
    /// The originating input line
    pub source_input: String,
}

/// Keys of a serialized [`NormalizedRecord`], in output order
pub const FIELDS: [&str; 15] = [
    "address",
    "id",
    "url",
    "valuation_estimate",
    "rent_estimate",
    "bedrooms",
    "bathrooms",
    "living_area",
    "lot_size",
    "year_built",
    "property_type",
    "price",
    "status",
    "price_history",
    "source_input",
];

/// Coerce a raw map into the fixed output schema. Never fails.
pub fn normalize(raw: &Map<String, Value>, source: &str, fallback_url: &str) -> NormalizedRecord {
    let url = clean_optional_text(field(raw, "url")).or_else(|| {
        let fallback = clean_text(fallback_url);
        (!fallback.is_empty()).then_some(fallback)
    });

    let price_history = match field(raw, "price_history") {
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    };

    NormalizedRecord {
        address: clean_optional_text(field(raw, "address")),
        id: clean_optional_text(field(raw, "id")),
        url,
        valuation_estimate: parse_float(field(raw, "valuation_estimate")),
        rent_estimate: parse_float(field(raw, "rent_estimate")),
        bedrooms: parse_float(field(raw, "bedrooms")),
        bathrooms: parse_float(field(raw, "bathrooms")),
        living_area: parse_int(field(raw, "living_area")),
        lot_size: parse_int(field(raw, "lot_size")),
        year_built: parse_int(field(raw, "year_built")),
        property_type: clean_optional_text(field(raw, "property_type")),
        price: parse_int(field(raw, "price")),
        status: clean_optional_text(field(raw, "status")),
        price_history,
        source_input: clean_text(source),
    }
}

fn field<'a>(raw: &'a Map<String, Value>, key: &str) -> &'a Value {
    raw.get(key).unwrap_or(&NULL)
}

/// Trim and collapse internal whitespace to single spaces
pub fn clean_text(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").to_string()
}

/// Stringify a scalar and clean it; empty results become `None`
pub fn clean_optional_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Best-effort integer coercion. Floats are rounded; strings keep only digits and `-`.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => parse_int_str(s),
        _ => None,
    }
}

/// Integer coercion for text: "1,234" -> 1234, "abc" -> None
pub fn parse_int_str(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Best-effort float coercion. Strings keep digits, `-` and the first decimal point.
pub fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_str(s),
        _ => None,
    }
}

/// Float coercion for text: "$2,345.50" -> 2345.5
pub fn parse_float_str(text: &str) -> Option<f64> {
    let mut seen_point = false;
    let cleaned: String = text
        .chars()
        .filter(|c| match *c {
            '0'..='9' | '-' => true,
            '.' if !seen_point => {
                seen_point = true;
                true
            }
            _ => false,
        })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}
