//! Unified error handling for the trajectory engine.
//!
//! The core algorithms are infallible: they assume clean, time-ordered input
//! and always produce output. Errors only arise at the edges, when validating
//! user-supplied configuration and when collecting results from background
//! workers.

use thiserror::Error;

/// Unified error type for trajectory-engine operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    /// A configuration field holds a value the algorithms cannot use
    #[error("Invalid configuration for '{field}': {message}")]
    InvalidConfig { field: &'static str, message: String },

    /// A background job finished without delivering a result (it panicked
    /// or its channel was dropped)
    #[error("Background worker disconnected before delivering a result")]
    WorkerDisconnected,

    /// A result arrived for a request that has since been superseded
    #[error("Result for request {requested} is stale (current request is {current})")]
    StaleResult { requested: u64, current: u64 },

    /// An async worker task failed to join
    #[error("Worker task failed: {message}")]
    Join { message: String },
}

/// Result type alias for trajectory-engine operations.
pub type Result<T> = std::result::Result<T, TrajectoryError>;

/// Reject thresholds that are NaN, infinite or negative.
pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(TrajectoryError::InvalidConfig {
            field,
            message: format!("must be finite, got {}", value),
        });
    }
    if value < 0.0 {
        return Err(TrajectoryError::InvalidConfig {
            field,
            message: format!("must not be negative, got {}", value),
        });
    }
    Ok(())
}

/// Reject values that are not strictly positive and finite.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<()> {
    ensure_non_negative(field, value)?;
    if value == 0.0 {
        return Err(TrajectoryError::InvalidConfig {
            field,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
