//! Error types for skybridge-router.

use thiserror::Error;

use crate::flow::FlowId;

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors raised by the router. Everything except [`RouterError::InvalidName`]
/// and [`RouterError::UnknownEndpoint`] from `recv` is fatal to the notice loop.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Progress notice with the wrong shape.
    #[error("malformed notice {notice:?}: {reason}")]
    Malformed { notice: String, reason: String },

    /// Progress notice with an operation other than SEND or RECV.
    #[error("unknown operation {op:?} in notice {notice:?}")]
    UnknownOp { notice: String, op: String },

    /// No endpoint registered under this name.
    #[error("unknown endpoint {0:?}")]
    UnknownEndpoint(String),

    /// A SEND notice names a flow belonging to a different pair.
    #[error("flow {flow} belongs to {expected}, notice reported {reported}")]
    PairMismatch {
        flow: FlowId,
        expected: String,
        reported: String,
    },

    /// Sent bytes would exceed the flow size.
    #[error("flow {flow} send accounting overflow: {sent} + {credit} > {size}")]
    SendOverflow {
        flow: FlowId,
        sent: u64,
        credit: u64,
        size: u64,
    },

    /// Received bytes left over after every queued flow was satisfied.
    #[error("receive accounting overflow on {src} -> {dst}: {surplus} bytes with no flow in flight")]
    RecvOverflow { src: String, dst: String, surplus: u64 },

    /// The flow already has an id.
    #[error("flow {0} is already started")]
    AlreadyStarted(FlowId),

    /// `compile` already ran.
    #[error("router is already compiled")]
    AlreadyCompiled,

    /// `start_flow` or a notice arrived before `compile`.
    #[error("router is not compiled yet")]
    NotCompiled,

    /// Two endpoints with the same name.
    #[error("endpoint {0:?} is already registered")]
    DuplicateEndpoint(String),

    /// Name rejected by validation.
    #[error("illegal endpoint name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The network side dropped an endpoint's directive channel.
    #[error("directive channel for {0:?} is closed")]
    DirectiveChannelClosed(String),
}
