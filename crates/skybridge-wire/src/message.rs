//! Built-in message types.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::MsgTypeId;
use crate::registry::{MessageRegistry, WireMessage};

/// Opaque bytes, carried verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMessage(pub Vec<u8>);

impl RawMessage {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self(data.into())
    }
}

impl WireMessage for RawMessage {
    const TYPE_ID: MsgTypeId = 0;
    const NAME: &'static str = "RawMessage";

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn decode(payload: &[u8]) -> Result<Self> {
        Ok(Self(payload.to_vec()))
    }
}

/// A captured camera frame stamped with the simulated time of capture.
///
/// The image bytes are already encoded (PNG or similar) by the capture side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMessage {
    pub timestamp: f64,
    pub image: Vec<u8>,
}

impl WireMessage for ImageMessage {
    const TYPE_ID: MsgTypeId = 2;
    const NAME: &'static str = "ImageMessage";

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn decode(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }
}

/// Union of the built-in messages.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Raw(RawMessage),
    Image(ImageMessage),
}

impl From<RawMessage> for Message {
    fn from(m: RawMessage) -> Self {
        Message::Raw(m)
    }
}

impl From<ImageMessage> for Message {
    fn from(m: ImageMessage) -> Self {
        Message::Image(m)
    }
}

/// Registry holding every built-in message type.
pub fn builtin_registry() -> Result<MessageRegistry<Message>> {
    MessageRegistry::new()
        .with::<RawMessage>()?
        .with::<ImageMessage>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDecoder;

    #[test]
    fn builtin_ids_do_not_collide() {
        let registry = builtin_registry().unwrap();
        assert!(registry.contains(RawMessage::TYPE_ID));
        assert!(registry.contains(ImageMessage::TYPE_ID));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn image_message_through_a_frame() {
        let registry = builtin_registry().unwrap();
        let img = ImageMessage {
            timestamp: 1.25,
            image: vec![0x89, b'P', b'N', b'G', 1, 2, 3],
        };

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&img.to_frame().unwrap()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(registry.decode(&frames[0]).unwrap(), Message::Image(img));
    }

    #[test]
    fn raw_message_is_verbatim() {
        let raw = RawMessage::new(&b"I'm GCS"[..]);
        assert_eq!(raw.encode().unwrap(), b"I'm GCS".to_vec());
        assert_eq!(RawMessage::decode(b"bye").unwrap(), RawMessage::new(&b"bye"[..]));
    }
}
