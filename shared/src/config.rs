use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::ChannelError;
use crate::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS, MAX_RECONNECT_ATTEMPTS_LIMIT};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_STREAM_PATH: &str = "/api/notifications/stream";
pub const DEFAULT_SUMMARY_PATH: &str = "/api/notifications/unread-summary";

/// Endpoints and reconnect tuning, supplied by the shell as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelConfig {
    pub api_base_url: String,
    pub stream_path: String,
    pub summary_path: String,
    pub base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub with_credentials: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            summary_path: DEFAULT_SUMMARY_PATH.to_string(),
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            with_credentials: true,
        }
    }
}

impl ChannelConfig {
    pub fn from_json(raw: &str) -> Result<Self, ChannelError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ChannelError::invalid_config("<root>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChannelError> {
        self.base_url()?;

        for (field, path) in [
            ("streamPath", &self.stream_path),
            ("summaryPath", &self.summary_path),
        ] {
            if !path.starts_with('/') {
                return Err(ChannelError::invalid_config(field, "must start with '/'"));
            }
        }

        if self.base_delay_ms == 0 {
            return Err(ChannelError::invalid_config("baseDelayMs", "must be > 0"));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ChannelError::invalid_config(
                "maxReconnectAttempts",
                "must be > 0",
            ));
        }
        if self.max_reconnect_attempts > MAX_RECONNECT_ATTEMPTS_LIMIT {
            return Err(ChannelError::invalid_config(
                "maxReconnectAttempts",
                format!("must be <= {MAX_RECONNECT_ATTEMPTS_LIMIT}"),
            ));
        }

        Ok(())
    }

    pub fn stream_url(&self) -> Result<Url, ChannelError> {
        self.endpoint("streamPath", &self.stream_path)
    }

    pub fn summary_url(&self) -> Result<Url, ChannelError> {
        self.endpoint("summaryPath", &self.summary_path)
    }

    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    fn base_url(&self) -> Result<Url, ChannelError> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| ChannelError::invalid_config("apiBaseUrl", e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ChannelError::invalid_config(
                    "apiBaseUrl",
                    format!("unsupported scheme '{other}'"),
                ))
            }
        }

        if url.host_str().is_none() {
            return Err(ChannelError::invalid_config("apiBaseUrl", "missing host"));
        }

        Ok(url)
    }

    fn endpoint(&self, field: &str, path: &str) -> Result<Url, ChannelError> {
        // Absolute paths replace any path on the base, which is what we want.
        self.base_url()?
            .join(path)
            .map_err(|e| ChannelError::invalid_config(field, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChannelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_delay(), Duration::from_millis(1000));
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ChannelConfig {
            api_base_url: "https://console.example.com/admin/".into(),
            ..ChannelConfig::default()
        };
        assert_eq!(
            config.stream_url().unwrap().as_str(),
            "https://console.example.com/api/notifications/stream"
        );
        assert_eq!(
            config.summary_url().unwrap().as_str(),
            "https://console.example.com/api/notifications/unread-summary"
        );
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            ChannelConfig::from_json(r#"{"apiBaseUrl":"https://pay.example.com","baseDelayMs":250}"#)
                .unwrap();
        assert_eq!(config.api_base_url, "https://pay.example.com");
        assert_eq!(config.base_delay_ms, 250);
        assert_eq!(config.stream_path, DEFAULT_STREAM_PATH);
        assert!(config.with_credentials);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            ChannelConfig::from_json("{not json"),
            Err(ChannelError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_scheme() {
        let config = ChannelConfig {
            api_base_url: "ftp://files.example.com".into(),
            ..ChannelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ChannelError::InvalidConfig { field, .. }) if field == "apiBaseUrl"
        ));
    }

    #[test]
    fn test_rejects_relative_paths() {
        let config = ChannelConfig {
            summary_path: "api/unread".into(),
            ..ChannelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ChannelError::InvalidConfig { field, .. }) if field == "summaryPath"
        ));
    }

    #[test]
    fn test_rejects_attempt_bounds() {
        let zero = ChannelConfig {
            max_reconnect_attempts: 0,
            ..ChannelConfig::default()
        };
        assert!(zero.validate().is_err());

        let huge = ChannelConfig {
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS_LIMIT + 1,
            ..ChannelConfig::default()
        };
        assert!(huge.validate().is_err());

        let no_delay = ChannelConfig {
            base_delay_ms: 0,
            ..ChannelConfig::default()
        };
        assert!(no_delay.validate().is_err());
    }
}
