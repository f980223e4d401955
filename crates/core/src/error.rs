//! Error types shared across the core components.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Output buffer shape incompatible with an input shape or slice shape.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Spectral layout violation: downscaling, odd axis length, or a
    /// non-integer resampling factor.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Division by zero density with no regularisation configured.
    #[error("numeric domain: {0}")]
    NumericDomain(String),

    /// Update or reset on a statistics accumulator that was finalised.
    #[error("statistics accumulator already finalised")]
    UseAfterFinalise,
}
