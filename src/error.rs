use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Empty input line")]
    EmptyInput,

    #[error("No valid inputs found in {0}")]
    NoInputs(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream responded with status {status} for URL {url}")]
    Fetch { status: u16, url: String },

    #[error("Structured data decode failed: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl ScrapeError {
    /// Get an actionable hint for how to resolve this error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ScrapeError::Network(_) => Some(
                "Check your internet connection, or raise the timeout:\n  zscrape run --settings settings.json (\"timeout\": 30)"
            ),
            ScrapeError::Fetch { status: 403, .. } | ScrapeError::Fetch { status: 429, .. } => Some(
                "The upstream site is throttling requests. Lower the rate:\n  zscrape run --rate-limit 0.5"
            ),
            ScrapeError::Fetch { .. } => Some(
                "Check the listing still exists, or pass the page URL directly"
            ),
            ScrapeError::NoInputs(_) => Some(
                "Put one address, zpid or listing URL per line in the input file"
            ),
            ScrapeError::Config(_) => Some(
                "Check the settings file is a JSON (or .toml) object"
            ),
            ScrapeError::Io(_) => Some(
                "Check the input file exists and the output directory is writable"
            ),
            _ => None,
        }
    }

    /// Whether the error came from the network layer (skippable per item)
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, ScrapeError::Network(_) | ScrapeError::Fetch { .. })
    }
}

impl From<ureq::Error> for ScrapeError {
    fn from(err: ureq::Error) -> Self {
        ScrapeError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
