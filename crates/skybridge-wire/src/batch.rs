//! Outbound batching bounded by the connection buffer size.

use bytes::{Bytes, BytesMut};

/// Result of packing frames into one send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Concatenated frames that fit.
    pub bytes: Bytes,
    /// Per input frame: `Some(len)` if packed, `None` if left out.
    pub accepted: Vec<Option<usize>>,
}

impl Batch {
    /// Number of frames packed.
    pub fn packed(&self) -> usize {
        self.accepted.iter().filter(|a| a.is_some()).count()
    }
}

/// Pack encoded frames in order while the running total stays below `limit`.
///
/// Packing stops at the first frame that does not fit; it and every later
/// frame are reported as `None`.
pub fn pack_batch<I>(frames: I, limit: usize) -> Batch
where
    I: IntoIterator<Item = Bytes>,
{
    let mut buf = BytesMut::new();
    let mut accepted = Vec::new();
    let mut full = false;

    for frame in frames {
        if !full && buf.len() + frame.len() < limit {
            accepted.push(Some(frame.len()));
            buf.extend_from_slice(&frame);
        } else {
            full = true;
            accepted.push(None);
        }
    }

    Batch {
        bytes: buf.freeze(),
        accepted,
    }
}

/// Cut `data` into packets of at most `packet_size` bytes.
pub fn split_packets(data: &Bytes, packet_size: usize) -> Vec<Bytes> {
    let packet_size = packet_size.max(1);
    (0..data.len())
        .step_by(packet_size)
        .map(|start| data.slice(start..(start + packet_size).min(data.len())))
        .collect()
}

/// Packet size derived from the TCP send buffer (one fifth of it).
pub fn packet_size_for(send_buffer: usize) -> usize {
    (send_buffer / 5).max(1)
}
