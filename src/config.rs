/// Service configuration loader - parses climate_api.toml
///
/// Keeps the listening address, worker count, schema and the query windows
/// out of the code. Every key is optional; a missing default file yields the
/// built-in defaults. `DATABASE_URL` is read separately by `db`.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{ApiError, Result};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = "climate_api.toml";

/// Last observation date of the historical Hawaii dataset.
pub const HISTORICAL_ANCHOR: (i32, u32, u32) = (2017, 8, 23);

/// How the precipitation endpoint picks the end of its 365-day window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AnchorPolicy {
    /// Latest `date` present in `measurement`.
    #[default]
    Latest,
    /// A fixed calendar date.
    Fixed(NaiveDate),
}

impl AnchorPolicy {
    /// The fixed anchor of the historical dataset.
    pub fn historical() -> Self {
        let (y, m, d) = HISTORICAL_ANCHOR;
        AnchorPolicy::Fixed(NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN))
    }
}

impl TryFrom<String> for AnchorPolicy {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.trim() {
            "latest" => Ok(AnchorPolicy::Latest),
            "historical" => Ok(AnchorPolicy::historical()),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .map(AnchorPolicy::Fixed)
                .map_err(|e| {
                    format!(
                        "anchor must be \"latest\", \"historical\" or YYYY-MM-DD, got {:?}: {}",
                        other, e
                    )
                }),
        }
    }
}

/// Inclusive date window served by `/api/v1.0/tobs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemperatureWindow {
    pub start: String,
    pub end: String,
}

impl Default for TemperatureWindow {
    fn default() -> Self {
        Self {
            start: "2016-01-01".to_string(),
            end: "2016-12-31".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PrecipitationSection {
    #[serde(default)]
    anchor: AnchorPolicy,
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Size of the request worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Postgres schema holding `station` and `measurement`.
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    precipitation: PrecipitationSection,
    #[serde(default)]
    pub tobs: TemperatureWindow,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_workers() -> usize {
    4
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            workers: default_workers(),
            schema: None,
            precipitation: PrecipitationSection::default(),
            tobs: TemperatureWindow::default(),
        }
    }
}

impl ApiConfig {
    pub fn anchor(&self) -> AnchorPolicy {
        self.precipitation.anchor
    }

    pub fn with_anchor(mut self, anchor: AnchorPolicy) -> Self {
        self.precipitation.anchor = anchor;
        self
    }

    /// `bind:port` address for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ApiConfig =
            toml::from_str(contents).map_err(|e| ApiError::config(e.to_string()))?;

        if config.workers == 0 {
            return Err(ApiError::config("workers must be at least 1"));
        }

        Ok(config)
    }
}

/// Loads the service configuration.
///
/// An explicit path must exist. Without one, `climate_api.toml` in the
/// working directory is used if present, otherwise the defaults.
pub fn load_config(path: Option<&Path>) -> Result<ApiConfig> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };

    if !required && !path.exists() {
        return Ok(ApiConfig::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ApiError::config(format!("Failed to read {}: {}", path.display(), e)))?;

    ApiConfig::from_toml(&contents)
}
