//! Frame encoding and the streaming frame decoder.
//!
//! Wire layout (6 bytes of overhead per frame):
//! - type_id: 1 byte
//! - length: 4 bytes, unsigned, big-endian
//! - payload: `length` bytes
//! - checksum: 1 byte, first byte of BLAKE3(type_id ‖ length ‖ payload)

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Application-assigned message type id.
pub type MsgTypeId = u8;

/// Bytes preceding the payload.
pub const HEADER_LEN: usize = 5;

/// Bytes following the payload.
pub const CHECKSUM_LEN: usize = 1;

/// Default ceiling on a single payload (64 MiB).
pub const DEFAULT_MAX_PAYLOAD: u32 = 64 * 1024 * 1024;

/// One decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub type_id: MsgTypeId,
    pub payload: Bytes,
}

impl RawFrame {
    pub fn new(type_id: MsgTypeId, payload: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            payload: payload.into(),
        }
    }

    /// Size of this frame on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + CHECKSUM_LEN
    }
}

/// Compute the checksum byte over the header fields and payload.
pub fn checksum(type_id: MsgTypeId, len: u32, payload: &[u8]) -> u8 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[type_id]);
    hasher.update(&len.to_be_bytes());
    hasher.update(payload);
    hasher.finalize().as_bytes()[0]
}

/// Serialize a payload into a single frame.
pub fn encode(type_id: MsgTypeId, payload: &[u8]) -> Result<Bytes, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge(payload.len()))?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    buf.put_u8(type_id);
    buf.put_u32(len);
    buf.put_slice(payload);
    buf.put_u8(checksum(type_id, len, payload));
    Ok(buf.freeze())
}

#[derive(Debug)]
enum DecodeState {
    AwaitingType,
    AwaitingLength { type_id: MsgTypeId },
    AwaitingPayload { type_id: MsgTypeId, len: u32 },
    AwaitingChecksum { type_id: MsgTypeId, payload: Bytes },
    Poisoned,
}

/// Streaming decoder for one logical sender.
///
/// Bytes may arrive in arbitrary fragments; each state consumes exactly what
/// it needs and unconsumed bytes are kept for the next [`feed`](Self::feed).
/// A checksum mismatch or an oversized length fails the connection: the
/// decoder reports the error once and [`FrameError::Poisoned`] afterwards.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    state: DecodeState,
    max_payload: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a decoder that rejects payloads longer than `max_payload`.
    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buf: BytesMut::new(),
            state: DecodeState::AwaitingType,
            max_payload,
        }
    }

    /// Append bytes and return every frame they complete, in order.
    ///
    /// On error, frames completed earlier in the same call are dropped along
    /// with the connection.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<RawFrame>, FrameError> {
        if self.is_poisoned() {
            return Err(FrameError::Poisoned);
        }
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.decode_next()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Advance the state machine until a frame completes or bytes run out.
    pub fn decode_next(&mut self) -> Result<Option<RawFrame>, FrameError> {
        loop {
            // Every early return below restores the state; errors leave it poisoned.
            let state = std::mem::replace(&mut self.state, DecodeState::Poisoned);
            match state {
                DecodeState::Poisoned => return Err(FrameError::Poisoned),

                DecodeState::AwaitingType => {
                    if self.buf.is_empty() {
                        self.state = DecodeState::AwaitingType;
                        return Ok(None);
                    }
                    self.state = DecodeState::AwaitingLength {
                        type_id: self.buf.get_u8(),
                    };
                }

                DecodeState::AwaitingLength { type_id } => {
                    if self.buf.len() < 4 {
                        self.state = DecodeState::AwaitingLength { type_id };
                        return Ok(None);
                    }
                    let len = self.buf.get_u32();
                    if len > self.max_payload {
                        tracing::warn!(type_id, len, max = self.max_payload, "oversized frame, failing stream");
                        return Err(FrameError::Oversized {
                            type_id,
                            len,
                            max: self.max_payload,
                        });
                    }
                    self.state = DecodeState::AwaitingPayload { type_id, len };
                }

                DecodeState::AwaitingPayload { type_id, len } => {
                    if self.buf.len() < len as usize {
                        self.state = DecodeState::AwaitingPayload { type_id, len };
                        return Ok(None);
                    }
                    let payload = self.buf.split_to(len as usize).freeze();
                    self.state = DecodeState::AwaitingChecksum { type_id, payload };
                }

                DecodeState::AwaitingChecksum { type_id, payload } => {
                    if self.buf.is_empty() {
                        self.state = DecodeState::AwaitingChecksum { type_id, payload };
                        return Ok(None);
                    }
                    let received = self.buf.get_u8();
                    let expected = checksum(type_id, payload.len() as u32, &payload);
                    if received != expected {
                        let head = &payload[..payload.len().min(16)];
                        tracing::warn!(
                            type_id,
                            len = payload.len(),
                            head = %hex::encode(head),
                            "checksum mismatch, failing stream"
                        );
                        return Err(FrameError::ChecksumMismatch {
                            type_id,
                            expected,
                            received,
                        });
                    }
                    self.state = DecodeState::AwaitingType;
                    return Ok(Some(RawFrame { type_id, payload }));
                }
            }
        }
    }

    /// Bytes buffered but not yet consumed by a state.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// True when no partial frame is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, DecodeState::AwaitingType) && self.buf.is_empty()
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self.state, DecodeState::Poisoned)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
