//! Global tracing subscriber for callwatch binaries
//!
//! Logs always go to stderr so stdout stays free for notification output.
//! `RUST_LOG` wins over the configured level when it is set.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{CallEngineError, Result};

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// `[logging]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `callwatch_call_engine=debug,info`
    pub level: String,

    pub format: LogFormat,

    /// Include the source file and line in every log line
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            source_location: false,
        }
    }
}

impl LoggingConfig {
    /// Check that the level parses as a filter directive
    pub fn validate(&self) -> Result<()> {
        self.filter().map(|_| ())
    }

    fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            CallEngineError::config(format!("Invalid logging.level {:?}: {}", self.level, e))
        })
    }
}

/// Install the global subscriber
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
    result.map_err(|e| CallEngineError::config(format!("Cannot install logger: {}", e)))?;

    tracing::info!("Starting callwatch v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
