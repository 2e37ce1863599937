//! Client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CLOSE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RECONNECT_MIN_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),

    #[error("invalid websocket url '{0}' (expected ws:// or wss://)")]
    InvalidUrl(String),

    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
    pub connect_timeout: Duration,
    /// How long a local close waits for the peer's close reply.
    pub close_timeout: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
}

impl ClientConfig {
    /// Config for `url` with default timeouts.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: validate_url(url.into())?,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            close_timeout: Duration::from_secs(DEFAULT_CLOSE_TIMEOUT_SECS),
            reconnect_min: Duration::from_millis(DEFAULT_RECONNECT_MIN_MS),
            reconnect_max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
        })
    }

    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `EVENTWIRE_URL`
    ///
    /// Optional:
    /// - `EVENTWIRE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `EVENTWIRE_CLOSE_TIMEOUT_SECS`: default 5
    /// - `EVENTWIRE_RECONNECT_MIN_MS`: default 1000
    /// - `EVENTWIRE_RECONNECT_MAX_MS`: default 10000
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("EVENTWIRE_URL").map_err(|_| ConfigError::Missing("EVENTWIRE_URL"))?;
        Self::new(url)?.with_env_overrides()
    }

    /// Apply the optional timing variables on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(secs) = env_parse_u64("EVENTWIRE_CONNECT_TIMEOUT_SECS")? {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse_u64("EVENTWIRE_CLOSE_TIMEOUT_SECS")? {
            self.close_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse_u64("EVENTWIRE_RECONNECT_MIN_MS")? {
            self.reconnect_min = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse_u64("EVENTWIRE_RECONNECT_MAX_MS")? {
            self.reconnect_max = Duration::from_millis(ms);
        }
        if self.reconnect_max < self.reconnect_min {
            self.reconnect_max = self.reconnect_min;
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

fn validate_url(url: String) -> Result<String, ConfigError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url)
    } else {
        Err(ConfigError::InvalidUrl(url))
    }
}

/// `Ok(None)` when unset; an error when set but unparseable.
fn env_parse_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { var, value: raw })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
