//! Error types for the engine

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed rule/counterparty/arrangement configuration.
    /// Raised at configuration load/save time, never during evaluation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient I/O failure talking to the capacity ledger backend
    #[error("Transient store error: {0}")]
    TransientStore(String),

    /// Decision log write failure. Surfaced to the caller separately from
    /// the business outcome; never blocks a decision.
    #[error("Audit log error: {0}")]
    AuditLog(String),

    /// A bounded-timeout operation did not complete in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Proposal payload is not usable (not an object, missing id)
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the caller may retry the failed operation
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::TransientStore(_) | EngineError::Timeout(_))
    }
}
