//! Error types for skybridge-wire.

use thiserror::Error;

use crate::frame::MsgTypeId;

/// Result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors raised while decoding a frame stream.
///
/// Integrity failures (`ChecksumMismatch`) and framing failures (`Oversized`)
/// are kept apart so callers can tell a corrupted byte from a desynchronized
/// stream. Both poison the decoder that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The trailing checksum byte does not match the frame contents.
    #[error("checksum mismatch on frame type {type_id}: expected {expected:#04x}, received {received:#04x}")]
    ChecksumMismatch {
        type_id: MsgTypeId,
        expected: u8,
        received: u8,
    },

    /// The declared payload length exceeds the decoder limit.
    #[error("frame type {type_id} declares {len} payload bytes, limit is {max}")]
    Oversized { type_id: MsgTypeId, len: u32, max: u32 },

    /// The payload cannot be described by a 4-byte length.
    #[error("payload of {0} bytes does not fit a frame")]
    PayloadTooLarge(usize),

    /// A previous error left the stream unrecoverable.
    #[error("decoder is poisoned by an earlier integrity or framing error")]
    Poisoned,
}

/// Errors raised by the message layer on top of frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame-level failure.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// No decoder is registered for this type id.
    #[error("no message type registered for id {0}")]
    UnknownType(MsgTypeId),

    /// Two message types claim the same id.
    #[error("type id {type_id} already registered to {existing}, cannot register {new}")]
    DuplicateType {
        type_id: MsgTypeId,
        existing: &'static str,
        new: &'static str,
    },

    /// Payload encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
