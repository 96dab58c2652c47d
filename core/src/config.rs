//! Client configuration.
//!
//! Defaults suit a local mock server; `from_env` overrides them from
//! `FEED_API_URL`, `FEED_API_TOKEN`, `FEED_PAGE_SIZE`, `FEED_POLL_SECS` and
//! `FEED_TIMEOUT_SECS`. A poll interval of zero disables polling.

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub page_size: usize,
    pub poll_interval: Option<Duration>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: Some(DEFAULT_POLL_INTERVAL),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("FEED_API_URL") {
            if url.trim().is_empty() {
                return Err(ConfigError::Empty { name: "FEED_API_URL" });
            }
            config.base_url = url.trim().to_string();
        }
        config.auth_token = lookup("FEED_API_TOKEN").filter(|token| !token.is_empty());

        if let Some(size) = number(&lookup, "FEED_PAGE_SIZE")? {
            if size == 0 {
                return Err(ConfigError::InvalidNumber {
                    name: "FEED_PAGE_SIZE",
                    value: "0".to_string(),
                });
            }
            config.page_size = size as usize;
        }
        if let Some(secs) = number(&lookup, "FEED_POLL_SECS")? {
            config.poll_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = number(&lookup, "FEED_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn number(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<u64>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}
