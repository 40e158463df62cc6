//! Dispatcher configuration.
//!
//! Loading configuration from disk belongs to the embedding application; this
//! module only defines the settings and how they deserialize.
//!
//! ```
//! use aicf_rpc::DispatcherConfig;
//! use std::time::Duration;
//!
//! let config = DispatcherConfig::from_json(r#"{"serverName": "figma-bridge", "defaultTimeoutMs": 30000}"#).unwrap();
//! assert_eq!(config.server_name, "figma-bridge");
//! assert_eq!(config.default_timeout(), Some(Duration::from_secs(30)));
//! assert_eq!(config.session_ttl(), Duration::from_secs(3600));
//! ```

use crate::session::DEFAULT_SESSION_TTL;
use serde::Deserialize;
use std::time::Duration;

/// Protocol name reported in the handshake.
pub const PROTOCOL_NAME: &str = "AICF-RPC";
/// Protocol version reported in the handshake.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Problems with a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sessionTtlMs must be greater than zero")]
    ZeroSessionTtl,
}

/// Settings for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Server name reported in the handshake.
    pub server_name: String,
    /// Server version reported in the handshake.
    pub server_version: String,
    /// Session lifetime in milliseconds.
    pub session_ttl_ms: u64,
    /// Bound applied to tool invocations that carry no timeout of their own.
    /// `None` lets handlers run unbounded.
    pub default_timeout_ms: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            server_name: "aicf-rpc".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            session_ttl_ms: DEFAULT_SESSION_TTL.as_millis() as u64,
            default_timeout_ms: None,
        }
    }
}

impl DispatcherConfig {
    /// Parses a JSON configuration document. Missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: DispatcherConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl_ms == 0 {
            return Err(ConfigError::ZeroSessionTtl);
        }
        Ok(())
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    /// Sets the session lifetime. A zero lifetime fails [`validate`](Self::validate)
    /// and is replaced with the default by [`Dispatcher::new`](crate::Dispatcher::new).
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_millis(self.session_ttl_ms)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = DispatcherConfig::from_json("{}").unwrap();
        assert_eq!(config, DispatcherConfig::default());
        assert_eq!(config.default_timeout(), None);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = DispatcherConfig::from_json(r#"{"sessionTtlMs": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroSessionTtl));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = DispatcherConfig::from_json(r#"{"port": 8080}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn builders_round_trip_durations() {
        let config = DispatcherConfig::default()
            .with_server_name("bridge")
            .with_session_ttl(Duration::from_secs(5))
            .with_default_timeout(Some(Duration::from_millis(250)));
        assert_eq!(config.server_name, "bridge");
        assert_eq!(config.session_ttl(), Duration::from_secs(5));
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(250)));
    }
}
