//! Error types for the footprint engine

use thiserror::Error;

/// Errors surfaced by the footprint engine
///
/// Only contract violations and invalid input reach the caller. Degenerate
/// measurements (zero sizes, zero-area boxes, missing anchors) are resolved
/// by policy inside the component that sees them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentinelError {
    /// A record was updated with a sample for another resource
    #[error("Resource URL mismatch: expected {expected}, got {got}")]
    IdentityMismatch { expected: String, got: String },

    /// A rating label outside the A+..F scale
    #[error("Unknown rating: {0}")]
    InvalidRating(String),

    /// A timing entry that cannot be turned into a sample
    #[error("Invalid timing sample: {0}")]
    InvalidSample(String),

    /// Options that cannot drive the scheduler
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, SentinelError>;
