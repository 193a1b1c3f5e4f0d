//! Error types for the frontier solver.
//!
//! Infeasible, unbounded and degenerate problems are not errors: they are
//! reported through [`crate::SolveStatus`] on the run outcome. The variants
//! here cover malformed input and broken internal bookkeeping.

use thiserror::Error;

/// Errors that can occur while setting up or running an optimization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaError {
    /// Malformed configuration, e.g. an unknown constraint-type character.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Problem validation failed (dimensions, bounds, non-finite data).
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// An ordered index set was asked for a member it does not hold.
    #[error("Index {value} not found in ordered set")]
    IndexNotFound {
        /// The value that was looked up
        value: usize,
    },

    /// An ordered index set is already full.
    #[error("Ordered set capacity {capacity} exceeded")]
    CapacityExceeded {
        /// Capacity of the set at the time of the insert
        capacity: usize,
    },

    /// A rank-one update would divide by a zero pivot.
    #[error("Numerical breakdown: {0}")]
    NumericalBreakdown(&'static str),

    /// The pending structural change names no variable.
    #[error("Missing candidate: {0}")]
    MissingCandidate(&'static str),
}

/// Result type for solver operations.
pub type ClaResult<T> = Result<T, ClaError>;
