use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_HUBSPOT_BASE_URL: &str = "https://api.hubapi.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// HubSpot's search endpoint caps a single page at 100 results.
const MAX_BATCH_LIMIT: u32 = 100;

/// Application configuration loaded from environment variables.
/// Startup fails if either API key is missing or a numeric override is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub hubspot_api_key: String,
    pub openai_api_key: String,
    pub hubspot_base_url: String,
    pub openai_base_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Period of the background classification timer.
    pub run_interval: Duration,
    /// Maximum contacts pulled from the CRM per run.
    pub batch_limit: u32,
    /// Number of entries retained by the in-memory activity log.
    pub log_capacity: usize,
    /// When set, every successful classification reports this confidence
    /// instead of a random placeholder in 80..=100.
    pub fixed_confidence: Option<u8>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds and validates the config from any key/value source.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let run_interval_secs: u64 = parse_var(&lookup, "RUN_INTERVAL_SECS", 300)?;
        if run_interval_secs == 0 {
            bail!("RUN_INTERVAL_SECS must be greater than zero");
        }

        let batch_limit: u32 = parse_var(&lookup, "CONTACT_BATCH_LIMIT", MAX_BATCH_LIMIT)?;
        if batch_limit == 0 || batch_limit > MAX_BATCH_LIMIT {
            bail!("CONTACT_BATCH_LIMIT must be between 1 and {MAX_BATCH_LIMIT}");
        }

        let log_capacity: usize = parse_var(&lookup, "LOG_CAPACITY", 100)?;
        if log_capacity == 0 {
            bail!("LOG_CAPACITY must be greater than zero");
        }

        let fixed_confidence = match lookup("FIXED_CONFIDENCE") {
            Some(raw) => {
                let value: u8 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("FIXED_CONFIDENCE must be 0-100, got '{raw}'"))?;
                if value > 100 {
                    bail!("FIXED_CONFIDENCE must be 0-100, got {value}");
                }
                Some(value)
            }
            None => None,
        };

        Ok(Config {
            hubspot_api_key: require_var(&lookup, "HUBSPOT_API_KEY")?,
            openai_api_key: require_var(&lookup, "OPENAI_API_KEY")?,
            hubspot_base_url: base_url_var(&lookup, "HUBSPOT_BASE_URL", DEFAULT_HUBSPOT_BASE_URL),
            openai_base_url: base_url_var(&lookup, "OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            port: parse_var(&lookup, "PORT", 3000)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            run_interval: Duration::from_secs(run_interval_secs),
            batch_limit,
            log_capacity,
            fixed_confidence,
        })
    }
}

fn require_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn base_url_var(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
