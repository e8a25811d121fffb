//! Property records produced by extraction

use serde::{Deserialize, Serialize};

/// One entry of a listing's price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub date: String,
    pub event: String,
    pub price: Option<i64>,
}

/// Which extraction strategy produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Embedded script data block
    Structured,
    /// Pattern matching over visible text
    Heuristic,
}

/// A property listing as extracted from one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRecord {
    pub address: String,
    pub id: String,
    /// Always populated: the input URL or the resolved fetch URL
    pub url: String,
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
    pub price_history: Vec<PriceEvent>,
    #[serde(skip)]
    pub strategy: Strategy,
}

impl PropertyRecord {
    /// A record with only the identifying fields set
    pub fn bare(address: String, id: String, url: String, strategy: Strategy) -> Self {
        Self {
            address,
            id,
            url,
            valuation_estimate: None,
            rent_estimate: None,
            bedrooms: None,
            bathrooms: None,
            living_area: None,
            lot_size: None,
            year_built: None,
            property_type: None,
            price: None,
            status: None,
            price_history: Vec::new(),
            strategy,
        }
    }

    /// Flatten into the loosely typed map the normalizer consumes
    pub fn to_raw_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// A number read off a page, remembering whether it was printed as a decimal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Whole(i64),
    Fractional(f64),
}

impl Measure {
    pub fn as_f64(self) -> f64 {
        match self {
            Measure::Whole(n) => n as f64,
            Measure::Fractional(f) => f,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Measure::Whole(n) => n,
            Measure::Fractional(f) => f.round() as i64,
        }
    }
}
