//! Per-endpoint channels.

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::flow::FlowId;
use crate::notice::Directive;

/// A fully received payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub src: String,
    pub flow_id: FlowId,
    pub payload: Bytes,
}

/// Network-facing half of an endpoint, returned by `FlowRouter::register`.
///
/// Whoever talks to the network simulator for this endpoint drains
/// [`EndPoint::next_directive`] and forwards each directive's text.
#[derive(Debug)]
pub struct EndPoint {
    name: String,
    directives: mpsc::UnboundedReceiver<Directive>,
}

impl EndPoint {
    pub(crate) fn new(name: String, directives: mpsc::UnboundedReceiver<Directive>) -> Self {
        Self { name, directives }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next directive, or `None` once the router is gone.
    pub async fn next_directive(&mut self) -> Option<Directive> {
        self.directives.recv().await
    }

    /// Directive already queued, if any.
    pub fn try_next_directive(&mut self) -> Option<Directive> {
        self.directives.try_recv().ok()
    }

    /// Split off the receiver, e.g. to hand it to a bridge task.
    pub fn into_directives(self) -> mpsc::UnboundedReceiver<Directive> {
        self.directives
    }
}

/// Completed deliveries waiting for the application.
///
/// The receiver sits behind an async mutex so that a blocking `recv` holds it
/// across the await.
#[derive(Debug)]
pub(crate) struct Inbox {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<mpsc::UnboundedReceiver<Delivery>>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub(crate) fn push(&self, delivery: Delivery) {
        // The inbox owns its receiver, so the channel cannot be closed here.
        let _ = self.tx.send(delivery);
    }

    pub(crate) fn receiver(&self) -> &Mutex<mpsc::UnboundedReceiver<Delivery>> {
        &self.rx
    }
}

/// Router-side state for one endpoint.
#[derive(Debug)]
pub(crate) struct Route {
    pub(crate) directives: mpsc::UnboundedSender<Directive>,
    pub(crate) inbox: std::sync::Arc<Inbox>,
}
