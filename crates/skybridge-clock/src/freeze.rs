//! Cooperative, reference-counted pause of clock advancement.

use std::collections::HashSet;

use crate::handle::ClockHandle;

/// Identity of one freeze holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(u64);

impl HolderId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Set of current holders. Non-empty means the clock must not advance.
#[derive(Debug, Default)]
pub struct FreezeGate {
    holders: HashSet<HolderId>,
    next_id: u64,
}

impl FreezeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh holder identity.
    pub fn next_holder(&mut self) -> HolderId {
        let id = HolderId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add `holder`. Returns false if it already held the gate.
    pub fn acquire(&mut self, holder: HolderId) -> bool {
        self.holders.insert(holder)
    }

    /// Remove `holder`. Returns true when this release emptied the gate.
    pub fn release(&mut self, holder: HolderId) -> bool {
        self.holders.remove(&holder) && self.holders.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        !self.holders.is_empty()
    }

    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }
}

/// Scoped freeze: acquired on creation, released when dropped.
///
/// Obtained from [`ClockHandle::frozen`]. Hold it around work that costs
/// wall-clock time but should cost no simulated time, e.g. a camera capture.
#[must_use = "the clock thaws as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FreezeGuard {
    clock: ClockHandle,
    holder: HolderId,
}

impl FreezeGuard {
    pub(crate) fn new(clock: ClockHandle, holder: HolderId) -> Self {
        Self { clock, holder }
    }

    pub fn holder(&self) -> HolderId {
        self.holder
    }
}

impl Drop for FreezeGuard {
    fn drop(&mut self) {
        self.clock.freeze(self.holder, false);
    }
}
