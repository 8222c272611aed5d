//! Error types for the rules crate.

pub use verdant_core::error::Error as CoreError;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Internal failure while evaluating a condition. Always converted
    /// to a non-matching decision before leaving the evaluator.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Failure while executing a rule branch.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Storage(#[from] CoreError),
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;

impl From<RuleError> for CoreError {
    fn from(e: RuleError) -> Self {
        match e {
            RuleError::Evaluation(s) => CoreError::Evaluation(s),
            RuleError::Execution(s) => CoreError::Internal(s),
            RuleError::Storage(inner) => inner,
        }
    }
}
