//! Static table from type id to message decoder.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{Result, WireError};
use crate::frame::{self, MsgTypeId, RawFrame};

/// A message that can travel inside a frame.
///
/// Type ids are chosen by the application and must be unique within a
/// [`MessageRegistry`]; collisions are rejected when the registry is built.
pub trait WireMessage: Sized {
    /// Frame type id for this message.
    const TYPE_ID: MsgTypeId;

    /// Human-readable name used in diagnostics.
    const NAME: &'static str;

    /// Serialize the message body.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Reconstruct a message from a frame payload.
    fn decode(payload: &[u8]) -> Result<Self>;

    /// Encode the message and wrap it in a frame.
    fn to_frame(&self) -> Result<Bytes> {
        Ok(frame::encode(Self::TYPE_ID, &self.encode()?)?)
    }
}

type DecodeFn<T> = fn(&[u8]) -> Result<T>;

struct Entry<T> {
    name: &'static str,
    decode: DecodeFn<T>,
}

/// Registered message types, decoding into a common application type `T`.
pub struct MessageRegistry<T> {
    entries: BTreeMap<MsgTypeId, Entry<T>>,
}

impl<T> MessageRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register message type `M`, failing if its id is already taken.
    pub fn register<M>(&mut self) -> Result<()>
    where
        M: WireMessage + Into<T>,
    {
        if let Some(existing) = self.entries.get(&M::TYPE_ID) {
            return Err(WireError::DuplicateType {
                type_id: M::TYPE_ID,
                existing: existing.name,
                new: M::NAME,
            });
        }

        self.entries.insert(
            M::TYPE_ID,
            Entry {
                name: M::NAME,
                decode: decode_into::<M, T>,
            },
        );
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<M>(mut self) -> Result<Self>
    where
        M: WireMessage + Into<T>,
    {
        self.register::<M>()?;
        Ok(self)
    }

    /// Decode a frame through the decoder registered for its type id.
    pub fn decode(&self, frame: &RawFrame) -> Result<T> {
        let entry = self
            .entries
            .get(&frame.type_id)
            .ok_or(WireError::UnknownType(frame.type_id))?;
        (entry.decode)(&frame.payload)
    }

    pub fn contains(&self, type_id: MsgTypeId) -> bool {
        self.entries.contains_key(&type_id)
    }

    /// Name registered for `type_id`.
    pub fn name_of(&self, type_id: MsgTypeId) -> Option<&'static str> {
        self.entries.get(&type_id).map(|e| e.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for MessageRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_into<M, T>(payload: &[u8]) -> Result<T>
where
    M: WireMessage + Into<T>,
{
    M::decode(payload).map(Into::into)
}
