use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ScrapeError};
use crate::fetch::{default_headers, FetchConfig, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Upstream site root
pub const DEFAULT_BASE_URL: &str = "https://www.zillow.com";

/// Advisory request rate, per second
pub const DEFAULT_RATE_LIMIT: f64 = 2.0;

/// Input listing used when neither flags nor settings name one
pub const DEFAULT_INPUT_FILE: &str = "data/inputs.txt";

/// Output path used when neither flags nor settings name one
pub const DEFAULT_OUTPUT_FILE: &str = "data/properties.json";

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    /// Both files, sharing the output path stem
    Both,
}

impl OutputFormat {
    /// Guess from a file extension: `.csv` is CSV, anything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => OutputFormat::Csv,
            _ => OutputFormat::Json,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Both => "both",
        })
    }
}

/// Effective run settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub base_url: String,
    /// Fetch timeout in seconds
    pub timeout: u64,
    pub user_agent: String,
    /// Requests per second across all workers; 0 disables throttling
    pub rate_limit_per_second: f64,
    /// Items processed at once
    pub concurrency: usize,
    /// `None` means guess from the output file extension
    pub output_format: Option<OutputFormat>,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    /// Extra request headers, sent after the defaults
    pub headers: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rate_limit_per_second: DEFAULT_RATE_LIMIT,
            concurrency: 1,
            output_format: None,
            input_file: None,
            output_file: None,
            headers: BTreeMap::new(),
        }
    }
}

/// Options a settings file may set. Absent keys keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettingsOverrides {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
    pub user_agent: Option<String>,
    pub rate_limit_per_second: Option<f64>,
    pub concurrency: Option<usize>,
    pub output_format: Option<OutputFormat>,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub headers: Option<BTreeMap<String, String>>,
}

impl SettingsOverrides {
    /// Reject values that would break every request of a run
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = self.base_url.as_deref().filter(|s| !s.trim().is_empty()) {
            let parsed = url::Url::parse(base_url.trim())?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ScrapeError::Config(format!(
                    "base_url must be http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        if self.timeout == Some(0) {
            return Err(ScrapeError::Config("timeout must be at least 1 second".into()));
        }
        Ok(())
    }
}

impl Settings {
    /// Apply overrides on top of these settings
    pub fn merged(mut self, overrides: SettingsOverrides) -> Self {
        if let Some(base_url) = overrides.base_url.filter(|s| !s.trim().is_empty()) {
            self.base_url = base_url;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = timeout;
        }
        if let Some(user_agent) = overrides.user_agent.filter(|s| !s.trim().is_empty()) {
            self.user_agent = user_agent;
        }
        if let Some(rate) = overrides.rate_limit_per_second {
            self.rate_limit_per_second = rate;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency.max(1);
        }
        if overrides.output_format.is_some() {
            self.output_format = overrides.output_format;
        }
        if overrides.input_file.is_some() {
            self.input_file = overrides.input_file;
        }
        if overrides.output_file.is_some() {
            self.output_file = overrides.output_file;
        }
        if let Some(headers) = overrides.headers {
            self.headers.extend(headers);
        }
        self
    }

    /// Load settings from a file, falling back to defaults.
    ///
    /// A missing file or a malformed one is never fatal: the problem is
    /// logged and the defaults are used.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Ok(p) => p,
                Err(e) => {
                    debug!("No default settings location: {}", e);
                    return Self::default();
                }
            },
        };

        if !path.exists() {
            debug!("Settings file {} not found, using defaults", path.display());
            return Self::default();
        }

        match Self::read_overrides(&path) {
            Ok(overrides) => {
                info!("Loaded settings from {}", path.display());
                Self::default().merged(overrides)
            }
            Err(e) => {
                error!("Failed to load settings from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse a settings file: TOML for `.toml`, JSON otherwise
    pub fn read_overrides(path: &Path) -> Result<SettingsOverrides> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        if is_toml {
            let overrides: SettingsOverrides = toml::from_str(&content)?;
            overrides.validate()?;
            return Ok(overrides);
        }

        let value: serde_json::Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            return Err(ScrapeError::Config(
                "Settings JSON must be an object at top level".into(),
            ));
        }
        let overrides: SettingsOverrides = serde_json::from_value(value)?;
        overrides.validate()?;
        Ok(overrides)
    }

    /// Get the default settings file path
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "zscrape")
            .ok_or_else(|| ScrapeError::Config("Could not determine config directory".into()))?;
        Ok(dirs.config_dir().join("settings.json"))
    }

    pub fn input_path(&self) -> PathBuf {
        self.input_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_FILE))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE))
    }

    /// Format to export with; falls back to the output extension
    pub fn effective_format(&self, output: &Path) -> OutputFormat {
        self.output_format
            .unwrap_or_else(|| OutputFormat::from_path(output))
    }

    /// HTTP configuration for the page fetcher
    pub fn fetch_config(&self) -> FetchConfig {
        let mut base_headers = default_headers();
        for (key, value) in &self.headers {
            if key.eq_ignore_ascii_case("user-agent") {
                warn!("Ignoring User-Agent header override; use user_agent instead");
                continue;
            }
            base_headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
            base_headers.push((key.clone(), value.clone()));
        }

        FetchConfig {
            timeout: Duration::from_secs(self.timeout.max(1)),
            user_agent: self.user_agent.clone(),
            base_headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "https://www.zillow.com");
        assert_eq!(settings.timeout, 15);
        assert_eq!(settings.rate_limit_per_second, 2.0);
        assert_eq!(settings.concurrency, 1);
        assert!(settings.output_format.is_none());
    }

    #[test]
    fn test_merge_overrides() {
        let overrides = SettingsOverrides {
            timeout: Some(30),
            base_url: Some("  ".into()),
            concurrency: Some(0),
            output_format: Some(OutputFormat::Csv),
            ..Default::default()
        };
        let settings = Settings::default().merged(overrides);
        assert_eq!(settings.timeout, 30);
        // Blank strings do not clobber defaults
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.output_format, Some(OutputFormat::Csv));
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_merge_is_pure() {
        let overrides = SettingsOverrides {
            rate_limit_per_second: Some(0.5),
            ..Default::default()
        };
        let a = Settings::default().merged(overrides.clone());
        let b = Settings::default().merged(overrides);
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_json_file_ignores_unknown_keys() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"timeout": 20, "output_format": "both", "unknown": true, "headers": {{"Referer": "https://www.google.com/"}}}}"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path()));
        assert_eq!(settings.timeout, 20);
        assert_eq!(settings.output_format, Some(OutputFormat::Both));
        assert_eq!(settings.headers.get("Referer").map(String::as_str), Some("https://www.google.com/"));
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "base_url = \"https://mirror.test\"\nrate_limit_per_second = 0.5").unwrap();

        let settings = Settings::load(Some(file.path()));
        assert_eq!(settings.base_url, "https://mirror.test");
        assert_eq!(settings.rate_limit_per_second, 0.5);
    }

    #[test]
    fn test_load_malformed_falls_back() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        assert_eq!(Settings::load(Some(file.path())), Settings::default());

        assert!(matches!(
            Settings::read_overrides(file.path()),
            Err(ScrapeError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"base_url": "not a url"}}"#).unwrap();
        assert!(matches!(
            Settings::read_overrides(file.path()),
            Err(ScrapeError::UrlParse(_))
        ));
        assert_eq!(Settings::load(Some(file.path())).base_url, DEFAULT_BASE_URL);

        let overrides = SettingsOverrides {
            base_url: Some("ftp://mirror.test".into()),
            ..Default::default()
        };
        assert!(matches!(overrides.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_load_missing_falls_back() {
        let settings = Settings::load(Some(Path::new("/definitely/not/here/settings.json")));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_output_format_display_and_guess() {
        assert_eq!(OutputFormat::Both.to_string(), "both");
        assert_eq!(OutputFormat::from_path(Path::new("out/data.CSV")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("out/data")), OutputFormat::Json);
    }

    #[test]
    fn test_fetch_config_headers() {
        let mut settings = Settings::default();
        settings.headers.insert("accept-language".into(), "de-DE".into());
        settings.headers.insert("User-Agent".into(), "ignored".into());

        let config = settings.fetch_config();
        let langs: Vec<_> = config
            .base_headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("accept-language"))
            .collect();
        assert_eq!(langs.len(), 1);
        assert_eq!(langs[0].1, "de-DE");
        assert!(!config.base_headers.iter().any(|(k, _)| k == "User-Agent"));
        assert_eq!(config.timeout, Duration::from_secs(15));
    }
}
