//! Application-facing view of one named participant.

use std::collections::VecDeque;
use std::sync::Arc;

use skybridge_clock::{ClockHandle, FreezeGuard, SimTime, WakeReason};
use skybridge_router::{Delivery, Flow, FlowId, FlowRouter, RecvMode};
use skybridge_wire::{
    pack_batch, packet_size_for, split_packets, AddressedDecoder, Message, MessageRegistry,
    WireMessage,
};
use tokio::time::Instant;

use crate::error::Result;

/// A decoded message and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub src: String,
    pub flow_id: FlowId,
    pub message: Message,
}

/// Outcome of [`Participant::tx_batch`].
#[derive(Debug, Clone)]
pub struct BatchSend {
    /// The flow carrying the packed frames; `None` if nothing fit.
    pub flow: Option<Flow>,
    /// Per input message: encoded length if packed, `None` if left out.
    pub accepted: Vec<Option<usize>>,
}

/// Sends framed messages through the router and decodes what arrives.
///
/// Byte streams are reassembled per sender, so a frame split across two
/// flows from the same peer still decodes.
pub struct Participant {
    name: String,
    clock: ClockHandle,
    router: Arc<FlowRouter>,
    registry: Arc<MessageRegistry<Message>>,
    decoder: AddressedDecoder,
    pending: VecDeque<Received>,
    send_buffer: usize,
}

impl Participant {
    pub fn new(
        name: impl Into<String>,
        clock: ClockHandle,
        router: Arc<FlowRouter>,
        registry: Arc<MessageRegistry<Message>>,
        send_buffer: usize,
    ) -> Self {
        Self {
            name: name.into(),
            clock,
            router,
            registry,
            decoder: AddressedDecoder::new(),
            pending: VecDeque::new(),
            send_buffer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    /// Frame `message` and start a flow to `dst`.
    pub fn tx<M: WireMessage>(&self, dst: &str, message: &M) -> Result<Flow> {
        let frame = message.to_frame()?;
        Ok(self.router.send(&self.name, dst, frame)?)
    }

    /// Frame `message` and send it as packets of a fifth of the send buffer,
    /// one flow per packet. The receiver reassembles them per sender.
    pub fn tx_packets<M: WireMessage>(&self, dst: &str, message: &M) -> Result<Vec<Flow>> {
        let frame = message.to_frame()?;
        let packets = split_packets(&frame, packet_size_for(self.send_buffer));
        let mut flows = Vec::with_capacity(packets.len());
        for packet in packets {
            flows.push(self.router.send(&self.name, dst, packet)?);
        }
        tracing::trace!(
            "{}: {} byte frame to {} in {} packets",
            self.name,
            frame.len(),
            dst,
            flows.len()
        );
        Ok(flows)
    }

    /// Pack as many messages as fit under the send buffer into one flow.
    pub fn tx_batch<M: WireMessage>(&self, dst: &str, messages: &[M]) -> Result<BatchSend> {
        let frames = messages
            .iter()
            .map(WireMessage::to_frame)
            .collect::<skybridge_wire::Result<Vec<_>>>()?;
        let batch = pack_batch(frames, self.send_buffer);

        let flow = if batch.packed() > 0 {
            Some(self.router.send(&self.name, dst, batch.bytes.clone())?)
        } else {
            tracing::warn!(
                "{}: no message fits the {} byte send buffer",
                self.name,
                self.send_buffer
            );
            None
        };
        Ok(BatchSend {
            flow,
            accepted: batch.accepted,
        })
    }

    /// Next decoded message.
    ///
    /// `Timeout` bounds the whole call, including deliveries that only carry
    /// part of a frame.
    pub async fn rx(&mut self, mode: RecvMode) -> Result<Option<Received>> {
        let deadline = match mode {
            RecvMode::Timeout(limit) => Some(Instant::now() + limit),
            _ => None,
        };

        loop {
            if let Some(received) = self.pending.pop_front() {
                return Ok(Some(received));
            }
            let mode = match deadline {
                Some(deadline) => RecvMode::Timeout(deadline.saturating_duration_since(Instant::now())),
                None => mode,
            };
            let Some(delivery) = self.router.recv(&self.name, mode).await? else {
                return Ok(None);
            };
            self.absorb(delivery)?;
        }
    }

    /// Decode every frame in `delivery`. Frames that fail to decode are
    /// skipped; the rest are still queued and the first failure is returned.
    fn absorb(&mut self, delivery: Delivery) -> Result<()> {
        let frames = self.decoder.feed(&delivery.src, &delivery.payload)?;
        let mut first_error = None;
        for frame in frames {
            match self.registry.decode(&frame) {
                Ok(message) => self.pending.push_back(Received {
                    src: delivery.src.clone(),
                    flow_id: delivery.flow_id,
                    message,
                }),
                Err(e) => {
                    tracing::warn!(
                        "{}: dropping type {} frame from {} (flow {}): {}",
                        self.name,
                        frame.type_id,
                        delivery.src,
                        delivery.flow_id,
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub async fn wait(&self, delay: SimTime) -> WakeReason {
        self.clock.wait(delay).await
    }

    pub async fn wait_until(&self, t: SimTime) -> WakeReason {
        self.clock.wait_until(t).await
    }

    /// Hold the clock still until the guard drops.
    pub fn frozen(&self) -> FreezeGuard {
        self.clock.frozen()
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("pending", &self.pending.len())
            .finish()
    }
}
