//! Skybridge Wire - self-framing, checksummed message protocol
//!
//! Multiplexes arbitrary typed messages over a byte stream that may be
//! fragmented or coalesced in transit.
//!
//! # Frame format
//!
//! ```text
//! +---------+-----------------+-----------------+----------+
//! | type_id | length (u32 BE) | payload         | checksum |
//! | 1 byte  | 4 bytes         | `length` bytes  | 1 byte   |
//! +---------+-----------------+-----------------+----------+
//! ```
//!
//! The checksum is the first byte of the BLAKE3 digest over the three
//! preceding fields. A mismatch fails the stream: the decoder reports
//! [`FrameError::ChecksumMismatch`] once and is poisoned afterwards.
//!
//! # Example
//!
//! ```rust
//! use skybridge_wire::{builtin_registry, FrameDecoder, Message, RawMessage, WireMessage};
//!
//! let registry = builtin_registry().unwrap();
//! let bytes = RawMessage::new(&b"hello"[..]).to_frame().unwrap();
//!
//! let mut decoder = FrameDecoder::new();
//! for frame in decoder.feed(&bytes).unwrap() {
//!     assert_eq!(registry.decode(&frame).unwrap(), Message::Raw(RawMessage::new(&b"hello"[..])));
//! }
//! ```

pub mod addressed;
pub mod batch;
pub mod error;
pub mod frame;
pub mod message;
pub mod registry;

pub use addressed::AddressedDecoder;
pub use batch::{pack_batch, packet_size_for, split_packets, Batch};
pub use error::{FrameError, Result, WireError};
pub use frame::{checksum, encode, FrameDecoder, MsgTypeId, RawFrame, DEFAULT_MAX_PAYLOAD};
pub use message::{builtin_registry, ImageMessage, Message, RawMessage};
pub use registry::{MessageRegistry, WireMessage};
