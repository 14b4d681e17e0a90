use crate::client::consts::{
    DEFAULT_CAPACITY, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_ENDPOINT, DEFAULT_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_DELAY_MS,
};
use std::time::Duration;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tried in order on every attempt; the first that accepts wins.
    endpoints: Vec<String>,
    origin: Option<String>,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    capacity: usize,
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    /// Replaces the endpoint list with a single endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoints = vec![endpoint.to_string()];
        self
    }

    pub fn with_fallback_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoints.push(endpoint.to_string());
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.config.origin = Some(origin.to_string());
        self
    }

    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            origin: None,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Reconnection attempts after the first failure. Fixed cap, no backoff.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
