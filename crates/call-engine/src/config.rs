use std::path::Path;
use std::time::Duration;

use callwatch_ami_core::ConnectionConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CallEngineError, Result};
use crate::logging::LoggingConfig;

/// Call monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Manager interface endpoint and credentials
    pub ami: ConnectionConfig,

    /// Extensions that belong to the organisation
    pub internal_numbers: Vec<String>,

    /// Correlation retention windows
    pub correlation: CorrelationConfig,

    /// Click-to-call settings
    pub dialing: DialingConfig,

    pub logging: LoggingConfig,
}

/// Retention windows used by the correlation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// How long a state change waits for its call group (milliseconds)
    pub early_event_timeout_ms: u64,

    /// How long a finalized missed call absorbs duplicate hangups (seconds)
    pub hangup_guard_ttl_secs: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            early_event_timeout_ms: 5_000,
            hangup_guard_ttl_secs: 10 * 60,
        }
    }
}

impl CorrelationConfig {
    pub fn early_event_timeout(&self) -> Duration {
        Duration::from_millis(self.early_event_timeout_ms)
    }

    pub fn hangup_guard_ttl(&self) -> Duration {
        Duration::from_secs(self.hangup_guard_ttl_secs)
    }
}

/// Outbound call origination settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialingConfig {
    /// Dialplan context the operator leg is placed in
    pub context: String,

    /// Originate timeout in milliseconds
    pub originate_timeout_ms: u64,
}

impl Default for DialingConfig {
    fn default() -> Self {
        Self {
            context: "from-internal".to_string(),
            originate_timeout_ms: 30_000,
        }
    }
}

impl MonitorConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CallEngineError::config(format!("Invalid config: {}", e)))
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CallEngineError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.ami.validate().map_err(CallEngineError::config)?;

        if self.internal_numbers.is_empty() {
            return Err(CallEngineError::config("internal_numbers cannot be empty"));
        }
        if let Some(blank) = self.internal_numbers.iter().find(|n| n.trim().is_empty()) {
            return Err(CallEngineError::config(format!("Blank internal number: {:?}", blank)));
        }
        if self.correlation.early_event_timeout_ms == 0 {
            return Err(CallEngineError::config(
                "correlation.early_event_timeout_ms must be greater than zero",
            ));
        }
        if self.dialing.context.trim().is_empty() {
            return Err(CallEngineError::config("dialing.context cannot be empty"));
        }
        self.logging.validate()
    }

    pub fn originate_timeout(&self) -> Duration {
        Duration::from_millis(self.dialing.originate_timeout_ms)
    }
}
