//! Error types for absint-fixpoint
//!
//! Provides unified error handling across the engine. Note the split drawn
//! here: conditions that carry analysis meaning (an infeasible path, an
//! `Error` control-flow successor) are values of [`EngineError`], while
//! violated engine invariants (call-string pop mismatch, dequeue on an empty
//! worklist, non-monotone widening) are programming errors and panic with
//! full diagnostic context instead. The fixpoint loop is itself the only
//! retry mechanism at this layer; individual operations are never retried.

use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A control-flow path is provably infeasible. Signalled by the transfer
    /// function; the path contributes no successors and the analysis goes on.
    #[error("unreachable program path")]
    Unreachable,

    /// The transfer function flagged an `Error` successor; the analysis run
    /// is aborted with the warnings collected so far preserved.
    #[error("analysis error at {location}: {message}")]
    Analysis { location: String, message: String },

    /// A defect in the engine wiring or a collaborating domain that still
    /// carries enough analysis context to report instead of panic.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    /// Create an analysis error at a program location
    pub fn analysis(location: impl ToString, message: impl Into<String>) -> Self {
        EngineError::Analysis {
            location: location.to_string(),
            message: message.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        EngineError::InvariantViolation(msg.into())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
