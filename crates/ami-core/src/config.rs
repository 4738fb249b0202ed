use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default AMI TCP port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Where and how to reach the manager interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,

    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Default wait for an action response in milliseconds
    pub action_timeout_ms: u64,

    /// Capacity of the event channel handed to the caller
    pub event_channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_AMI_PORT,
            username: String::new(),
            secret: String::new(),
            connect_timeout_ms: 5_000,
            action_timeout_ms: 10_000,
            event_channel_capacity: 1024,
        }
    }
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// Check the configuration for obvious mistakes
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("ami.host cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("ami.port cannot be 0".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("ami.username cannot be empty".to_string());
        }
        if self.connect_timeout_ms == 0 || self.action_timeout_ms == 0 {
            return Err("ami timeouts must be greater than zero".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err("ami.event_channel_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}
