//! Error types for the telemetry crate.

pub use verdant_core::error::Error as CoreError;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The raw value did not parse to a finite number. Nothing was
    /// written for the offending message.
    #[error("Invalid telemetry value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

impl From<TelemetryError> for CoreError {
    fn from(e: TelemetryError) -> Self {
        match e {
            TelemetryError::InvalidValue(s) => CoreError::InvalidValue(s),
            TelemetryError::Storage(inner) => inner,
            TelemetryError::Scheduler(s) => CoreError::Internal(s),
        }
    }
}
