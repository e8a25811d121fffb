//! Extraction from embedded script data blocks
//!
//! Listing pages embed the property as JSON somewhere inside a `<script>`
//! block, nested at an unpredictable depth and sometimes stringified inside
//! another JSON document. Nothing here deserializes into a fixed schema: the
//! block is decoded into a generic tree and searched for the first object
//! carrying both the listing id and the valuation estimate.

use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::input::InputRecord;
use crate::normalize::{clean_optional_text, clean_text, parse_float, parse_int};
use crate::property::{PriceEvent, PropertyRecord, Strategy};

/// Key holding the listing identifier
pub const ID_KEY: &str = "zpid";

/// Key holding the valuation estimate
pub const VALUATION_KEY: &str = "zestimate";

const ADDRESS_KEYS: &[&str] = &["address", "streetAddress", "formattedAddress"];
const VALUATION_KEYS: &[&str] = &[VALUATION_KEY, "price"];
const RENT_KEYS: &[&str] = &["rentZestimate"];
const PRICE_KEYS: &[&str] = &["price", "listPrice"];
const STATUS_KEYS: &[&str] = &["homeStatus", "status"];
const BEDROOM_KEYS: &[&str] = &["bedrooms", "beds"];
const BATHROOM_KEYS: &[&str] = &["bathrooms", "baths"];
const LIVING_AREA_KEYS: &[&str] = &["livingArea", "livingAreaValue"];
const LOT_SIZE_KEYS: &[&str] = &["lotSize", "lotSizeValue"];
const YEAR_BUILT_KEYS: &[&str] = &["yearBuilt"];
const PROPERTY_TYPE_KEYS: &[&str] = &["homeType", "propertyType"];
const HISTORY_DATE_KEYS: &[&str] = &["date", "eventDate"];
const HISTORY_EVENT_KEYS: &[&str] = &["event", "priceChangeEvent"];

/// Find the first script block that mentions both markers and decodes as JSON.
///
/// Candidates are tried in document order; the first successful decode wins
/// even if a later block would also decode.
pub fn extract_structured(markup: &str) -> Option<Value> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse("script").ok()?;

    for (idx, script) in document.select(&selector).enumerate() {
        let text: String = script.text().collect();
        if !(text.contains(VALUATION_KEY) && text.contains(ID_KEY)) {
            continue;
        }

        match decode_block(&text) {
            Ok(value) => {
                debug!(block = idx, "decoded structured data block");
                return Some(value);
            }
            Err(e) => debug!(block = idx, error = %e, "skipping candidate script"),
        }
    }

    None
}

/// Decode the first JSON object embedded in a script body
pub fn decode_block(text: &str) -> Result<Value> {
    let candidate = first_json_object(text)
        .ok_or_else(|| ScrapeError::Decode("no balanced object in script".into()))?;
    serde_json::from_str(candidate).map_err(|e| ScrapeError::Decode(e.to_string()))
}

/// Slice out the first top-level brace-balanced `{...}` of a text.
/// Braces inside JSON strings are ignored.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match *byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match *byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_payload(map: &Map<String, Value>) -> bool {
    map.contains_key(ID_KEY) && map.contains_key(VALUATION_KEY)
}

/// Pre-order depth-first search for the first object holding both markers
pub fn locate_payload(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if is_payload(map) {
                return Some(map);
            }
            map.values().find_map(locate_payload)
        }
        Value::Array(items) => items.iter().find_map(locate_payload),
        _ => None,
    }
}

/// Like [`locate_payload`], but also decodes string values that hold a
/// stringified JSON object mentioning both markers.
pub fn locate_embedded_payload(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if is_payload(map) {
                return Some(map.clone());
            }
            map.values().find_map(locate_embedded_payload)
        }
        Value::Array(items) => items.iter().find_map(locate_embedded_payload),
        Value::String(s) if looks_like_embedded_json(s) => {
            let inner = serde_json::from_str::<Value>(s).ok()?;
            locate_embedded_payload(&inner)
        }
        _ => None,
    }
}

fn looks_like_embedded_json(s: &str) -> bool {
    s.trim_start().starts_with('{') && s.contains(ID_KEY) && s.contains(VALUATION_KEY)
}

/// Find the property payload inside a decoded block, preferring a direct
/// object over one nested in a stringified document
pub fn find_payload(tree: &Value) -> Option<Map<String, Value>> {
    locate_payload(tree)
        .cloned()
        .or_else(|| locate_embedded_payload(tree))
}

/// First alternate key that is present, non-null and not an empty string
fn first_present<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

fn float_field(payload: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    first_present(payload, keys).and_then(parse_float)
}

fn int_field(payload: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    first_present(payload, keys).and_then(parse_int)
}

fn text_field(payload: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(payload, keys).and_then(clean_optional_text)
}

/// Addresses are either a plain string or an object of parts
fn address_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(parts) => {
            let part = |key: &str| parts.get(key).and_then(clean_optional_text);
            let street = part("streetAddress");
            let city = part("city");
            let region = [part("state"), part("zipcode")]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");

            let joined = [street, city, Some(region)]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        other => clean_optional_text(other),
    }
}

fn price_history(payload: &Map<String, Value>) -> Vec<PriceEvent> {
    let Some(Value::Array(items)) = payload.get("priceHistory") else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| {
            let date = text_field(item, HISTORY_DATE_KEYS).unwrap_or_default();
            let event = text_field(item, HISTORY_EVENT_KEYS).unwrap_or_default();
            let price = item.get("price").and_then(parse_int);
            if date.is_empty() && event.is_empty() && price.is_none() {
                return None;
            }
            Some(PriceEvent { date, event, price })
        })
        .collect()
}

/// Build a property record from a located payload
pub fn property_from_payload(
    payload: &Map<String, Value>,
    input: &InputRecord,
    url: &str,
) -> PropertyRecord {
    debug!(keys = ?payload.keys().collect::<Vec<_>>(), "parsing structured payload");

    // An address alternate only counts once it yields usable text
    let address = ADDRESS_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(address_text)
        .unwrap_or_else(|| clean_text(&input.value));
    let id = text_field(payload, &[ID_KEY]).unwrap_or_default();

    PropertyRecord {
        valuation_estimate: float_field(payload, VALUATION_KEYS),
        rent_estimate: float_field(payload, RENT_KEYS),
        bedrooms: float_field(payload, BEDROOM_KEYS),
        bathrooms: float_field(payload, BATHROOM_KEYS),
        living_area: int_field(payload, LIVING_AREA_KEYS),
        lot_size: int_field(payload, LOT_SIZE_KEYS),
        year_built: int_field(payload, YEAR_BUILT_KEYS),
        property_type: text_field(payload, PROPERTY_TYPE_KEYS),
        price: int_field(payload, PRICE_KEYS),
        status: text_field(payload, STATUS_KEYS),
        price_history: price_history(payload),
        ..PropertyRecord::bare(address, id, url.to_string(), Strategy::Structured)
    }
}
