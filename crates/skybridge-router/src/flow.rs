//! One application message tracked at byte granularity.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use bytes::Bytes;

use crate::error::{Result, RouterError};

/// Router-assigned flow id; strictly increasing in start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    sent: u64,
    received: u64,
}

#[derive(Debug)]
struct FlowInner {
    id: OnceLock<FlowId>,
    src: String,
    dst: String,
    payload: Bytes,
    progress: Mutex<Progress>,
}

/// Shared handle to a flow.
///
/// The router keeps clones in its tables while the flow is in flight; the
/// caller may keep one to watch progress.
#[derive(Debug, Clone)]
pub struct Flow {
    inner: Arc<FlowInner>,
}

impl Flow {
    /// Create an unstarted flow.
    pub fn new(src: impl Into<String>, dst: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            inner: Arc::new(FlowInner {
                id: OnceLock::new(),
                src: src.into(),
                dst: dst.into(),
                payload: payload.into(),
                progress: Mutex::new(Progress::default()),
            }),
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.inner.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id, once started.
    pub fn id(&self) -> Option<FlowId> {
        self.inner.id.get().copied()
    }

    pub fn is_started(&self) -> bool {
        self.inner.id.get().is_some()
    }

    pub fn src(&self) -> &str {
        &self.inner.src
    }

    pub fn dst(&self) -> &str {
        &self.inner.dst
    }

    pub fn payload(&self) -> &Bytes {
        &self.inner.payload
    }

    pub fn size(&self) -> u64 {
        self.inner.payload.len() as u64
    }

    pub fn bytes_sent(&self) -> u64 {
        self.progress().sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.progress().received
    }

    /// Every byte has been reported received.
    pub fn is_complete(&self) -> bool {
        self.bytes_received() == self.size()
    }

    pub(crate) fn assign_id(&self, id: FlowId) -> Result<()> {
        self.inner.id.set(id).map_err(|_| {
            RouterError::AlreadyStarted(self.id().unwrap_or(id))
        })
    }

    /// Add sent bytes; exceeding the size is an accounting violation.
    pub(crate) fn credit_sent(&self, credit: u64) -> Result<u64> {
        let size = self.size();
        let mut progress = self.progress();
        match progress.sent.checked_add(credit) {
            Some(sent) if sent <= size => {
                progress.sent = sent;
                Ok(sent)
            }
            _ => Err(RouterError::SendOverflow {
                flow: self.id().unwrap_or(FlowId(u64::MAX)),
                sent: progress.sent,
                credit,
                size,
            }),
        }
    }

    /// Apply up to `available` received bytes; returns how many were used.
    pub(crate) fn credit_received(&self, available: u64) -> u64 {
        let size = self.size();
        let mut progress = self.progress();
        let credit = available.min(size - progress.received);
        progress.received += credit;
        credit
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = *self.progress();
        match self.id() {
            Some(id) => write!(f, "flow {id}")?,
            None => write!(f, "flow (unstarted)")?,
        }
        write!(
            f,
            " {} -> {} sent {}/{} received {}/{}",
            self.src(),
            self.dst(),
            progress.sent,
            self.size(),
            progress.received,
            self.size()
        )
    }
}

/// Snapshot of a flow still in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReport {
    pub id: FlowId,
    pub src: String,
    pub dst: String,
    pub size: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl FlowReport {
    pub(crate) fn of(flow: &Flow, id: FlowId) -> Self {
        Self {
            id,
            src: flow.src().to_string(),
            dst: flow.dst().to_string(),
            size: flow.size(),
            bytes_sent: flow.bytes_sent(),
            bytes_received: flow.bytes_received(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_flow_is_unstarted() {
        let flow = Flow::new("A", "GCS", vec![0u8; 10]);
        assert_eq!(flow.id(), None);
        assert_eq!(flow.size(), 10);
        assert_eq!(flow.bytes_sent(), 0);
        assert!(!flow.is_complete());
    }

    #[test]
    fn id_assigned_once() {
        let flow = Flow::new("A", "B", vec![1u8]);
        flow.assign_id(FlowId(3)).unwrap();
        assert!(matches!(
            flow.assign_id(FlowId(4)),
            Err(RouterError::AlreadyStarted(FlowId(3)))
        ));
        assert_eq!(flow.id(), Some(FlowId(3)));
    }

    #[test]
    fn send_overflow_is_rejected_not_clamped() {
        let flow = Flow::new("A", "B", vec![0u8; 100]);
        assert_eq!(flow.credit_sent(60).unwrap(), 60);
        assert!(matches!(
            flow.credit_sent(41),
            Err(RouterError::SendOverflow { sent: 60, credit: 41, size: 100, .. })
        ));
        assert_eq!(flow.bytes_sent(), 60);
        assert_eq!(flow.credit_sent(40).unwrap(), 100);
    }

    #[test]
    fn receive_credit_stops_at_size() {
        let flow = Flow::new("A", "B", vec![0u8; 600]);
        assert_eq!(flow.credit_received(700), 600);
        assert!(flow.is_complete());
        assert_eq!(flow.credit_received(5), 0);
    }

    #[test]
    fn display_shows_progress() {
        let flow = Flow::new("A", "B", vec![0u8; 4]);
        flow.assign_id(FlowId(7)).unwrap();
        flow.credit_sent(2).unwrap();
        assert_eq!(flow.to_string(), "flow 7 A -> B sent 2/4 received 0/4");
    }
}
