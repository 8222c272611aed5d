//! Unified error handling for Verdant.
//!
//! This module provides a common error type shared across all crates,
//! reducing boilerplate and keeping error handling consistent.

/// Unified error type for Verdant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A raw telemetry value that does not parse to a finite number.
    /// Terminal for that one ingested message; nothing is written.
    #[error("Invalid telemetry value: {0}")]
    InvalidValue(String),

    /// Internal failure while evaluating a rule condition. Contained
    /// per rule and converted to a non-matching decision.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Storage/collaborator errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Outbound command channel errors.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Advisory text generator errors. Logged and swallowed by callers.
    #[error("Advisory error: {0}")]
    Advisory(String),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("action 42".to_string());
        assert!(err.to_string().contains("action 42"));

        let err = Error::InvalidValue("\"warm\"".to_string());
        assert!(err.to_string().starts_with("Invalid telemetry value"));
    }
}
