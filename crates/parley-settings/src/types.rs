//! Settings types.

use std::time::Duration;

use parley_core::constants::{
    DEFAULT_BUSY_GRACE, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_LIVENESS_DEADLINE,
};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root client settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Server endpoints.
    pub endpoints: EndpointSettings,
    /// Real-time channel timing.
    pub channel: ChannelSettings,
    /// Request dispatch behavior.
    pub request: RequestSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Credentials file. Defaults to `~/.parley/credentials.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<String>,
}

impl ClientSettings {
    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_scheme(
            "endpoints.httpBaseUrl",
            &self.endpoints.http_base_url,
            &["http://", "https://"],
        )?;
        check_scheme(
            "endpoints.wsBaseUrl",
            &self.endpoints.ws_base_url,
            &["ws://", "wss://"],
        )?;
        check_positive("channel.heartbeatIntervalMs", self.channel.heartbeat_interval_ms)?;
        check_positive("channel.livenessDeadlineMs", self.channel.liveness_deadline_ms)?;
        check_positive("request.timeoutMs", self.request.timeout_ms)?;
        Ok(())
    }
}

fn check_scheme(key: &str, url: &str, schemes: &[&str]) -> Result<()> {
    if schemes.iter().any(|s| url.starts_with(s) && url.len() > s.len()) {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue(format!(
            "{key} must start with one of {schemes:?}, got {url:?}"
        )))
    }
}

fn check_positive(key: &str, value: u64) -> Result<()> {
    if value == 0 {
        Err(SettingsError::InvalidValue(format!("{key} must be positive")))
    } else {
        Ok(())
    }
}

/// Base endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// Base URL prefixed to every HTTP request path.
    pub http_base_url: String,
    /// Base URL prefixed to every channel path.
    pub ws_base_url: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            http_base_url: "http://127.0.0.1:8080".to_string(),
            ws_base_url: "ws://127.0.0.1:8080".to_string(),
        }
    }
}

/// Real-time channel timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Heartbeat period in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Liveness deadline after each send, in milliseconds.
    pub liveness_deadline_ms: u64,
}

impl ChannelSettings {
    /// Heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Liveness deadline.
    pub fn liveness_deadline(&self) -> Duration {
        Duration::from_millis(self.liveness_deadline_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL.as_millis() as u64,
            liveness_deadline_ms: DEFAULT_LIVENESS_DEADLINE.as_millis() as u64,
        }
    }
}

/// Request dispatch behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestSettings {
    /// HTTP client timeout in milliseconds.
    pub timeout_ms: u64,
    /// Busy indicator hide grace in milliseconds.
    pub busy_grace_ms: u64,
    /// Whether calls engage the busy indicator unless told otherwise.
    pub busy_by_default: bool,
    /// Whether calls join the abort epoch unless told otherwise.
    pub abort_on_error: bool,
}

impl RequestSettings {
    /// HTTP client timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Busy indicator hide grace.
    pub fn busy_grace(&self) -> Duration {
        Duration::from_millis(self.busy_grace_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            busy_grace_ms: DEFAULT_BUSY_GRACE.as_millis() as u64,
            busy_by_default: true,
            abort_on_error: true,
        }
    }
}

/// Log output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn durations_follow_millis() {
        let settings = ClientSettings::default();
        assert_eq!(settings.channel.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(settings.channel.liveness_deadline(), Duration::from_secs(5));
        assert_eq!(settings.request.busy_grace(), Duration::from_millis(100));
        assert_eq!(settings.request.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_wrong_ws_scheme() {
        let mut settings = ClientSettings::default();
        settings.endpoints.ws_base_url = "http://example.com".into();
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) => {
            assert!(msg.contains("wsBaseUrl"));
        });
    }

    #[test]
    fn rejects_bare_scheme() {
        let mut settings = ClientSettings::default();
        settings.endpoints.http_base_url = "https://".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_deadline() {
        let mut settings = ClientSettings::default();
        settings.channel.liveness_deadline_ms = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) => {
            assert!(msg.contains("livenessDeadlineMs"));
        });
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"endpoints":{"wsBaseUrl":"wss://chat.example.com"}}"#;
        let settings: ClientSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.endpoints.ws_base_url, "wss://chat.example.com");
        assert_eq!(settings.endpoints.http_base_url, "http://127.0.0.1:8080");
        assert_eq!(settings.channel.heartbeat_interval_ms, 30_000);
    }
}
