//! Client configuration loaded from the environment.

use std::env;
use std::path::PathBuf;

use crate::types::GeoPoint;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
/// Init data the host passes in development mode
pub const DEV_INIT_DATA: &str = "dev_mode";
pub const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL, no trailing slash
    pub api_url: String,
    pub init_data: String,
    /// `limit` for the transactions endpoint; backend default when None
    pub history_limit: Option<u32>,
    /// Ledger cache file; default location when None
    pub cache_path: Option<PathBuf>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API URL '{0}': must start with http:// or https://")]
    InvalidApiUrl(String),
    #[error("Invalid history limit '{0}': must be between 1 and {max}", max = MAX_HISTORY_LIMIT)]
    InvalidHistoryLimit(String),
    #[error("Invalid coordinate {name}='{value}'")]
    InvalidCoordinate { name: &'static str, value: String },
    #[error("TRASHCASH_LAT and TRASHCASH_LNG must be set together")]
    PartialLocation,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            init_data: DEV_INIT_DATA.to_string(),
            history_limit: None,
            cache_path: None,
            location: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get("TRASHCASH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = normalize_api_url(&api_url)?;

        let init_data = get("TRASHCASH_INIT_DATA").unwrap_or_else(|| DEV_INIT_DATA.to_string());

        let history_limit = get("TRASHCASH_HISTORY_LIMIT")
            .map(|raw| parse_history_limit(&raw))
            .transpose()?;

        let cache_path = get("TRASHCASH_CACHE_PATH").map(PathBuf::from);

        let location = match (get("TRASHCASH_LAT"), get("TRASHCASH_LNG")) {
            (Some(lat), Some(lng)) => Some(GeoPoint {
                lat: parse_coordinate("TRASHCASH_LAT", &lat, 90.0)?,
                lng: parse_coordinate("TRASHCASH_LNG", &lng, 180.0)?,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialLocation),
        };

        Ok(Self {
            api_url,
            init_data,
            history_limit,
            cache_path,
            location,
        })
    }
}

pub fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidApiUrl(raw.to_string()));
    }
    Ok(url.trim_end_matches('/').to_string())
}

pub fn parse_history_limit(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if (1..=MAX_HISTORY_LIMIT).contains(&n) => Ok(n),
        _ => Err(ConfigError::InvalidHistoryLimit(raw.to_string())),
    }
}

fn parse_coordinate(name: &'static str, raw: &str, bound: f64) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= bound => Ok(v),
        _ => Err(ConfigError::InvalidCoordinate {
            name,
            value: raw.to_string(),
        }),
    }
}
