//! Custom error types for the snapshot engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran and reported failure. `message` is its stderr,
    /// kept verbatim (trimmed) so callers can show it to the operator.
    #[error("{message}")]
    Command { program: String, message: String },

    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("Malformed output: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unexpected output from {program}: {detail}")]
    UnexpectedShape { program: String, detail: String },

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Notifier error: {0}")]
    Notifier(String),
}

impl SnapError {
    /// Whether the failure came from the tool's output rather than from
    /// running it.
    pub fn is_malformed(&self) -> bool {
        matches!(self, SnapError::Malformed(_) | SnapError::UnexpectedShape { .. })
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;
