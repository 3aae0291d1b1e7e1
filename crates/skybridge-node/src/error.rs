//! Error types for the Skybridge node.

use skybridge_clock::ClockError;
use skybridge_router::RouterError;
use skybridge_wire::WireError;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a co-simulation.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad settings or environment
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings document did not parse
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Framing or message decoding failed
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Clock loop failed
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// Router rejected an operation or a notice
    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    /// A peer channel went away
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// A spawned loop panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
