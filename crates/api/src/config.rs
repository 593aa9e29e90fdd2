//! Startup configuration, read once from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use stockroom_infra::SeedData;
use stockroom_observability::LogFormat;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LOW_MATCH_THRESHOLD: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{key} must be set when USE_PERSISTENT_STORES=true")]
    Missing { key: &'static str },

    #[error("cannot read seed file {path}: {message}")]
    Seed { path: PathBuf, message: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    /// Fixtures loaded into the stores at startup.
    pub seed: Option<SeedData>,
    pub low_match_threshold: f64,
    /// Postgres URL for the ledger; `None` keeps everything in memory.
    pub database_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::default(),
            seed: None,
            low_match_threshold: DEFAULT_LOW_MATCH_THRESHOLD,
            database_url: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("STOCKROOM_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "STOCKROOM_BIND_ADDR",
                message: e.to_string(),
            })?;

        let log_format = match get("STOCKROOM_LOG_FORMAT") {
            Some(v) => v.parse::<LogFormat>().map_err(|e| ConfigError::Invalid {
                key: "STOCKROOM_LOG_FORMAT",
                message: e.to_string(),
            })?,
            None => LogFormat::default(),
        };

        let low_match_threshold = match get("STOCKROOM_LOW_MATCH_THRESHOLD") {
            Some(v) => parse_threshold(&v)?,
            None => DEFAULT_LOW_MATCH_THRESHOLD,
        };

        let seed = get("STOCKROOM_SEED_FILE")
            .map(|path| load_seed(PathBuf::from(path)))
            .transpose()?;

        let use_persistent = match get("USE_PERSISTENT_STORES") {
            Some(v) => v.parse::<bool>().map_err(|e| ConfigError::Invalid {
                key: "USE_PERSISTENT_STORES",
                message: e.to_string(),
            })?,
            None => false,
        };
        let database_url = if use_persistent {
            Some(get("DATABASE_URL").ok_or(ConfigError::Missing { key: "DATABASE_URL" })?)
        } else {
            None
        };

        Ok(Self {
            bind_addr,
            log_format,
            seed,
            low_match_threshold,
            database_url,
        })
    }
}

fn parse_threshold(raw: &str) -> Result<f64, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        key: "STOCKROOM_LOW_MATCH_THRESHOLD",
        message,
    };
    let value = raw.parse::<f64>().map_err(|e| invalid(e.to_string()))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{value} is outside 0..=1")));
    }
    Ok(value)
}

fn load_seed(path: PathBuf) -> Result<SeedData, ConfigError> {
    let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Seed {
        path: path.clone(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Seed {
        path,
        message: e.to_string(),
    })
}
