use tracing::debug;

use crate::heuristic::{extract_heuristic, HeuristicFields};
use crate::input::InputRecord;
use crate::normalize::clean_text;
use crate::property::{PropertyRecord, Strategy};
use crate::structured::{extract_structured, find_payload, property_from_payload};

/// Extract a property from page markup.
///
/// The embedded structured payload wins when one is found; otherwise the
/// visible-text heuristics fill in what they can. `url` is the page the
/// markup came from and is always carried into the record.
pub fn extract_property(markup: &str, input: &InputRecord, url: &str) -> PropertyRecord {
    if let Some(payload) = extract_structured(markup).as_ref().and_then(find_payload) {
        debug!(input = %input.value, "using structured payload");
        return property_from_payload(&payload, input, url);
    }

    debug!(input = %input.value, "falling back to heuristic extraction");
    property_from_heuristics(extract_heuristic(markup), input, url)
}

fn property_from_heuristics(fields: HeuristicFields, input: &InputRecord, url: &str) -> PropertyRecord {
    let address = fields.address.unwrap_or_else(|| clean_text(&input.value));
    let id = fields.id.unwrap_or_default();

    PropertyRecord {
        valuation_estimate: fields.valuation_estimate.map(|v| v as f64),
        bedrooms: fields.bedrooms.map(|m| m.as_f64()),
        bathrooms: fields.bathrooms.map(|m| m.as_f64()),
        living_area: fields.living_area.map(|m| m.as_i64()),
        year_built: fields.year_built,
        property_type: fields.property_type,
        ..PropertyRecord::bare(address, id, url.to_string(), Strategy::Heuristic)
    }
}
