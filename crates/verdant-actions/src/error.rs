//! Error types for the actions crate.

pub use verdant_core::error::Error as CoreError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Unknown action id on status lookup.
    #[error("Action not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

impl From<DispatchError> for CoreError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::NotFound(s) => CoreError::NotFound(s),
            DispatchError::Storage(inner) => inner,
            DispatchError::Serialization(s) => CoreError::Serialization(s),
        }
    }
}
