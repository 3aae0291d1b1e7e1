//! Many senders multiplexed over one receiver.
//!
//! Frames from one sender may be split across chunks, so every sender gets its
//! own [`FrameDecoder`].

use std::collections::HashMap;

use crate::error::Result;
use crate::frame::{FrameDecoder, RawFrame, DEFAULT_MAX_PAYLOAD};

/// One decoder per sender.
#[derive(Debug)]
pub struct AddressedDecoder {
    decoders: HashMap<String, FrameDecoder>,
    max_payload: u32,
}

impl AddressedDecoder {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            decoders: HashMap::new(),
            max_payload,
        }
    }

    /// Feed bytes known to come from `from`.
    pub fn feed(&mut self, from: &str, data: &[u8]) -> Result<Vec<RawFrame>> {
        let max_payload = self.max_payload;
        let decoder = self
            .decoders
            .entry(from.to_string())
            .or_insert_with(|| FrameDecoder::with_max_payload(max_payload));
        Ok(decoder.feed(data)?)
    }

    /// Forget the decoder for `from`, e.g. after it was poisoned.
    pub fn reset(&mut self, from: &str) -> bool {
        self.decoders.remove(from).is_some()
    }
}

impl Default for AddressedDecoder {
    fn default() -> Self {
        Self::new()
    }
}
