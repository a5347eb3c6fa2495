//! Error handling for the mining supervisor
//!
//! Construction-time failures are returned synchronously; runtime failures
//! travel through the `MiningTask` handle returned by `MiningInstance::run`.

use thiserror::Error;

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mining supervisor
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A required construction input is missing or blank
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The miner does not declare the requested algorithm
    #[error("Algorithm {algorithm} is not supported by miner {miner}")]
    UnsupportedAlgorithm { miner: String, algorithm: String },

    /// No backend variant exists for the miner name
    #[error("Unsupported miner: {name}")]
    UnsupportedMiner { name: String },

    /// External process errors
    #[error("External process error: {message}")]
    ExternalProcess { message: String },

    /// The read loop stopped for a reason other than a cancellation request
    #[error("Unexpected interruption: {message}")]
    UnexpectedInterruption { message: String },

    /// Cancellation of an async operation
    #[error("Operation was cancelled: {operation}")]
    Cancelled { operation: String },

    /// Invalid state errors
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an unsupported algorithm error
    pub fn unsupported_algorithm(miner: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            miner: miner.into(),
            algorithm: algorithm.into(),
        }
    }

    /// Create an unsupported miner error
    pub fn unsupported_miner(name: impl Into<String>) -> Self {
        Self::UnsupportedMiner { name: name.into() }
    }

    /// Create an external process error
    pub fn external_process(message: impl Into<String>) -> Self {
        Self::ExternalProcess {
            message: message.into(),
        }
    }

    /// Create an unexpected interruption error
    pub fn unexpected_interruption(message: impl Into<String>) -> Self {
        Self::UnexpectedInterruption {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Whether this error marks a requested shutdown rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
            Error::Config { .. } => "config",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            Error::UnsupportedMiner { .. } => "unsupported_miner",
            Error::ExternalProcess { .. } => "external_process",
            Error::UnexpectedInterruption { .. } => "unexpected_interruption",
            Error::Cancelled { .. } => "cancelled",
            Error::InvalidState { .. } => "invalid_state",
        }
    }
}
