use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "PROFILE_DIRECTORY_";
pub const FEED_PATH: &str = "/api/ws";

/// How the store resolves two records for the same identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Whichever record arrives last wins, regardless of `updated_at`.
    #[default]
    ArrivalOrder,
    /// Incoming records older than the stored one are ignored.
    NewestTimestamp,
}

impl MergePolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ArrivalOrder => "arrival-order",
            Self::NewestTimestamp => "newest-timestamp",
        }
    }
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "arrival" | "arrival-order" | "arrival_order" => Ok(Self::ArrivalOrder),
            "timestamp" | "newest" | "newest-timestamp" | "newest_timestamp" => {
                Ok(Self::NewestTimestamp)
            }
            _ => Err(format!("unsupported merge policy: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default)]
    pub reconnect_jitter_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            reconnect_jitter_ms: 0,
            request_timeout_ms: default_request_timeout_ms(),
            merge_policy: MergePolicy::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    3000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load from `PROFILE_DIRECTORY_*` variables, after reading `.env` if one
    /// exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unset variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(base_url) = var("BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(raw) = var("RECONNECT_INTERVAL_MS") {
            config.reconnect_interval_ms = parse_millis("RECONNECT_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = var("RECONNECT_JITTER_MS") {
            config.reconnect_jitter_ms = parse_millis("RECONNECT_JITTER_MS", &raw)?;
        }
        if let Some(raw) = var("REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_millis("REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = var("MERGE_POLICY") {
            config.merge_policy =
                raw.parse()
                    .map_err(|message: String| ConfigError::InvalidValue {
                        key: format!("{ENV_PREFIX}MERGE_POLICY"),
                        message,
                    })?;
        }

        config.feed_url()?;
        Ok(config)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn reconnect_jitter(&self) -> Duration {
        Duration::from_millis(self.reconnect_jitter_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn origin(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Absolute URL for a REST path such as `/api/profiles`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.origin(), path)
    }

    /// The feed endpoint on the same origin, with the scheme upgraded to
    /// `ws`/`wss`.
    pub fn feed_url(&self) -> Result<String, ConfigError> {
        let origin = self.origin();
        let upgraded = if let Some(rest) = origin.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = origin.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        };
        if upgraded.ends_with("://") {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(format!("{upgraded}{FEED_PATH}"))
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.reconnect_interval(), Duration::from_millis(3000));
        assert_eq!(config.reconnect_jitter(), Duration::ZERO);
        assert_eq!(config.merge_policy, MergePolicy::ArrivalOrder);
        assert_eq!(config.feed_url().unwrap(), "ws://127.0.0.1:3000/api/ws");
    }

    #[test]
    fn feed_url_follows_page_scheme() {
        let secure = ClientConfig::new("https://profiles.example.com/");
        assert_eq!(secure.feed_url().unwrap(), "wss://profiles.example.com/api/ws");
        assert_eq!(
            secure.api_url("/api/profiles"),
            "https://profiles.example.com/api/profiles"
        );

        assert!(ClientConfig::new("ftp://example.com").feed_url().is_err());
        assert!(ClientConfig::new("http://").feed_url().is_err());
    }

    #[test]
    fn env_overrides_are_parsed() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PROFILE_DIRECTORY_BASE_URL", "http://localhost:8080"),
            ("PROFILE_DIRECTORY_RECONNECT_INTERVAL_MS", "500"),
            ("PROFILE_DIRECTORY_MERGE_POLICY", "timestamp"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.reconnect_interval_ms, 500);
        assert_eq!(config.merge_policy, MergePolicy::NewestTimestamp);
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(
            "PROFILE_DIRECTORY_RECONNECT_INTERVAL_MS",
            "soon",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = ClientConfig::from_lookup(lookup(&[("PROFILE_DIRECTORY_BASE_URL", "localhost")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidBaseUrl("localhost".to_string()));
    }
}
