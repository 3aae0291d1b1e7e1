//! Timer-ordered min-heap of suspended waiters.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tokio::sync::oneshot;

use crate::clock::SimTime;

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Target already reached, or the clock was not running.
    Immediate,
    /// The clock advanced to the target.
    Elapsed,
    /// The simulation ended before the target.
    Shutdown,
}

#[derive(Debug)]
struct WaitEntry {
    wake_time: SimTime,
    seq: u64,
    waker: oneshot::Sender<WakeReason>,
}

impl PartialEq for WaitEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WaitEntry {}

impl PartialOrd for WaitEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WaitEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wake_time
            .total_cmp(&other.wake_time)
            .then(self.seq.cmp(&other.seq))
    }
}

/// A woken entry, as reported by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Woken {
    pub wake_time: SimTime,
    pub seq: u64,
}

/// Pending waits ordered by `(wake_time, seq)`.
///
/// `seq` is handed out at registration, so equal wake times wake in
/// registration order.
#[derive(Debug, Default)]
pub struct WaitScheduler {
    heap: BinaryHeap<Reverse<WaitEntry>>,
    next_seq: u64,
}

impl WaitScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter; the receiver completes when it is woken.
    pub fn register(&mut self, wake_time: SimTime) -> oneshot::Receiver<WakeReason> {
        let (waker, rx) = oneshot::channel();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(WaitEntry {
            wake_time,
            seq,
            waker,
        }));
        rx
    }

    /// Earliest pending wake time.
    pub fn earliest(&self) -> Option<SimTime> {
        self.heap.peek().map(|Reverse(e)| e.wake_time)
    }

    /// Wake every entry with `wake_time <= deadline`, in order.
    pub fn wake_expired(&mut self, deadline: SimTime) -> Vec<Woken> {
        let mut woken = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(e)| e.wake_time <= deadline)
        {
            if let Some(Reverse(entry)) = self.heap.pop() {
                woken.push(Self::fire(entry, WakeReason::Elapsed));
            }
        }
        woken
    }

    /// Wake every entry regardless of its target, in order.
    pub fn wake_all(&mut self, reason: WakeReason) -> Vec<Woken> {
        let mut woken = Vec::with_capacity(self.heap.len());
        while let Some(Reverse(entry)) = self.heap.pop() {
            woken.push(Self::fire(entry, reason));
        }
        woken
    }

    fn fire(entry: WaitEntry, reason: WakeReason) -> Woken {
        let woken = Woken {
            wake_time: entry.wake_time,
            seq: entry.seq,
        };
        // The waiter may have been dropped; nothing to do then.
        if entry.waker.send(reason).is_err() {
            tracing::trace!(seq = entry.seq, "waiter gone before wake");
        }
        woken
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
