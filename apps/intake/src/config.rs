use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::api_client::MAX_FETCH_RETRIES;

/// Client configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub fetch_retries: u32,
    pub progress_tick: Duration,
    pub progress_step: u8,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let progress_step = parse_or("PROGRESS_STEP", 20u8)?;
        if progress_step == 0 || progress_step > 100 {
            bail!("PROGRESS_STEP must be between 1 and 100, got {progress_step}");
        }

        Ok(Config {
            api_base_url: require_env("API_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            api_token: std::env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 120u64)?),
            fetch_retries: check_fetch_retries(parse_or("FETCH_RETRIES", 3u32)?)?,
            progress_tick: Duration::from_millis(parse_or("PROGRESS_TICK_MS", 100u64)?),
            progress_step,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Defaults for everything except the backend origin.
    pub fn default_with_base_url(api_base_url: impl Into<String>) -> Self {
        let api_base_url: String = api_base_url.into();
        Config {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(120),
            fetch_retries: 3,
            progress_tick: Duration::from_millis(100),
            progress_step: 20,
            rust_log: "info".to_string(),
        }
    }
}

fn check_fetch_retries(retries: u32) -> Result<u32> {
    if retries == 0 || retries > MAX_FETCH_RETRIES {
        bail!("FETCH_RETRIES must be between 1 and {MAX_FETCH_RETRIES}, got {retries}");
    }
    Ok(retries)
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strips_trailing_slash() {
        let config = Config::default_with_base_url("http://localhost:8000/");
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.progress_step, 20);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_fetch_retries_bounds() {
        assert_eq!(check_fetch_retries(1).unwrap(), 1);
        assert_eq!(check_fetch_retries(MAX_FETCH_RETRIES).unwrap(), MAX_FETCH_RETRIES);
        assert!(check_fetch_retries(0).is_err());
        assert!(check_fetch_retries(u32::MAX).is_err());
    }
}
