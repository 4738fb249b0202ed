use thiserror::Error;

/// Call engine errors
///
/// Event correlation itself never fails; these cover the monitor's
/// connection, configuration and request/response operations.
#[derive(Error, Debug)]
pub enum CallEngineError {
    /// Manager interface errors
    #[error("AMI error: {0}")]
    Ami(#[from] callwatch_ami_core::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The monitor was stopped or never started
    #[error("Monitor is not running")]
    NotRunning,
}

impl CallEngineError {
    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new InvalidInput error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type for call engine operations
pub type Result<T> = std::result::Result<T, CallEngineError>;
