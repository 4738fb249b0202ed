use thiserror::Error;

/// Errors raised by the AMI session layer
#[derive(Error, Debug)]
pub enum Error {
    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent something that is not a valid AMI block
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Login was rejected by the manager
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The connection is closed or was never established
    #[error("Connection closed")]
    ConnectionClosed,

    /// No response arrived in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The manager answered an action with an error response
    #[error("Action {action} failed: {message}")]
    ActionFailed { action: String, message: String },
}

impl Error {
    /// Create a new Protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new Timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether the error means the session is unusable from now on
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ConnectionClosed | Error::Authentication(_))
    }
}

/// Result type for AMI operations
pub type Result<T> = std::result::Result<T, Error>;
