//! Error types for sage-core

use thiserror::Error;

/// Top-level error type for the assessment kernel
///
/// Every fallible kernel operation surfaces one of these kinds. Validation
/// failures never mutate state; `Numeric` aborts the operation with no state
/// change and is reported rather than retried.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input, unknown enum value, or out-of-range parameter
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation contradicts current session state
    ///
    /// Covers completed sessions, duplicate answers, and the loser of a
    /// concurrent write race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Degenerate arithmetic in the IRT or BKT core
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Unexpected repository failure; the caller may retry
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Build a `NotFound` for an entity kind and id
    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(format!("{kind} '{id}'"))
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;
