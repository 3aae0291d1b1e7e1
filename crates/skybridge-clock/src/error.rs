//! Error types for skybridge-clock.

use thiserror::Error;

/// Result type for clock operations.
pub type Result<T> = std::result::Result<T, ClockError>;

/// Errors that end the clock loop.
#[derive(Debug, Error)]
pub enum ClockError {
    /// The stepper channel closed; no further steps can be coordinated.
    #[error("stepper channel closed")]
    StepperClosed,

    /// Step arithmetic went negative. Always a bug.
    #[error("negative step {step} computed at t={now}")]
    NegativeStep { step: f64, now: f64 },

    /// The physical simulator failed to advance.
    #[error("physics stepper failed: {0}")]
    Physics(#[from] anyhow::Error),

    /// Rejected configuration value.
    #[error("invalid clock configuration: {0}")]
    InvalidConfig(String),
}
