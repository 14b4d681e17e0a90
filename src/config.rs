//! Startup settings and session timings.
//!
//! The backend endpoint can be overridden once at startup through
//! `ASSISTANT_BACKEND_URL`; everything else has compiled-in defaults.

use crate::avatar::ReadinessConfig;
use crate::client;
use std::env;
use std::time::Duration;
use tracing::Level;

pub const BACKEND_URL_ENV: &str = "ASSISTANT_BACKEND_URL";

/// Default name of the speech provider handed to the widget's `speak`.
pub const DEFAULT_SPEAK_PROVIDER: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Backend endpoint must be a ws:// or wss:// url: {0}")]
    InvalidEndpoint(String),
}

/// Settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub log_level: Level,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Ignored if not present.
        dotenvy::dotenv().ok();

        let endpoint = env::var(BACKEND_URL_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if let Some(ref endpoint) = endpoint {
            validate_endpoint(endpoint)?;
        }

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            endpoint,
            log_level,
        })
    }

    /// Connection settings with the endpoint override applied.
    pub fn client_config(&self) -> client::Config {
        let builder = client::Config::builder();
        match self.endpoint {
            Some(ref endpoint) => builder.with_endpoint(endpoint).build(),
            None => builder.build(),
        }
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidEndpoint(endpoint.to_string()))
    }
}

/// Timings and avatar settings of one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between accepting a voice transcript and dispatching it.
    pub voice_staging_delay: Duration,
    pub command_capacity: usize,
    pub speak_provider: String,
    pub speak_config: serde_json::Value,
    pub readiness: ReadinessConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            voice_staging_delay: Duration::from_millis(150),
            command_capacity: 64,
            speak_provider: DEFAULT_SPEAK_PROVIDER.to_string(),
            speak_config: serde_json::Value::Object(Default::default()),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_voice_staging_delay(mut self, delay: Duration) -> Self {
        self.voice_staging_delay = delay;
        self
    }

    pub fn with_speak_provider(mut self, provider: &str, config: serde_json::Value) -> Self {
        self.speak_provider = provider.to_string();
        self.speak_config = config;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_a_websocket_url() {
        assert!(validate_endpoint("wss://assistant.example.com/ws").is_ok());
        assert!(validate_endpoint("WS://localhost:5000").is_ok());
        assert!(matches!(
            validate_endpoint("https://assistant.example.com"),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn override_replaces_default_endpoint() {
        let settings = Settings {
            endpoint: Some("wss://assistant.example.com/ws".to_string()),
            log_level: Level::INFO,
        };
        assert_eq!(settings.client_config().endpoints(), ["wss://assistant.example.com/ws"]);

        let settings = Settings {
            endpoint: None,
            log_level: Level::INFO,
        };
        assert_eq!(settings.client_config().endpoints(), client::Config::new().endpoints());
    }
}
