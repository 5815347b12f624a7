//! Error types for matchmaker-core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across the matchmaking pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Schema violation, weights not summing to 1, unknown role, non-finite number.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Too few participants/problems to satisfy the target team size.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Cost matrix contains negative or non-finite entries.
    #[error("invalid cost: {0}")]
    InvalidCost(String),

    /// Attempt to start an already-running phase.
    #[error("phase busy: {0}")]
    PhaseBusy(String),

    /// Attempt to start phase N when phase N-1 is not completed.
    #[error("phase precondition unmet: {0}")]
    PhasePreconditionUnmet(String),

    /// Cooperative cancellation.
    #[error("canceled")]
    Canceled,

    /// Wall-clock budget exhausted.
    #[error("timeout after {seconds} seconds")]
    Timeout {
        /// Seconds elapsed before timeout
        seconds: f64,
    },

    /// Transient repository error, exhausted retry budget.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Solver-internal invariant violation; should never occur on valid input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an insufficient data error
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Create an invalid cost error
    pub fn invalid_cost(msg: impl Into<String>) -> Self {
        Self::InvalidCost(msg.into())
    }

    /// Create a phase busy error
    pub fn phase_busy(msg: impl Into<String>) -> Self {
        Self::PhaseBusy(msg.into())
    }

    /// Create a phase precondition unmet error
    pub fn phase_precondition_unmet(msg: impl Into<String>) -> Self {
        Self::PhasePreconditionUnmet(msg.into())
    }

    /// Create a storage unavailable error
    pub fn storage_unavailable(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(seconds: f64) -> Self {
        Self::Timeout { seconds }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error kind represents cooperative termination
    /// (cancel/timeout), which the orchestrator treats identically.
    pub fn is_cooperative_termination(&self) -> bool {
        matches!(self, Self::Canceled | Self::Timeout { .. })
    }
}
