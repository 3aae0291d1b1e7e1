//! The shared clock handle injected into every component.
//!
//! Clock state, the wait heap, and the freeze gate live behind one lock.
//! The lock is never held across an await point.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::clock::{SimTime, SimulationClock};
use crate::error::{ClockError, Result};
use crate::freeze::{FreezeGate, FreezeGuard, HolderId};
use crate::scheduler::{WaitScheduler, WakeReason, Woken};

#[derive(Debug)]
struct ClockState {
    clock: SimulationClock,
    waits: WaitScheduler,
    gate: FreezeGate,
    granularity: SimTime,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ClockState>,
    thawed: Notify,
}

/// Cheap, cloneable access to the single simulated timeline.
#[derive(Clone)]
pub struct ClockHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ClockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ClockHandle")
            .field("now", &state.clock.now())
            .field("end_time", &state.clock.end_time())
            .field("running", &state.clock.is_running())
            .field("pending_waits", &state.waits.len())
            .field("freeze_holders", &state.gate.holder_count())
            .finish()
    }
}

impl ClockHandle {
    /// Create a clock stepping in quanta of `granularity` seconds.
    pub fn new(granularity: SimTime, end_time: SimTime) -> Result<Self> {
        if !(granularity > 0.0 && granularity.is_finite()) {
            return Err(ClockError::InvalidConfig(format!(
                "granularity must be positive and finite, got {granularity}"
            )));
        }
        if end_time.is_nan() {
            return Err(ClockError::InvalidConfig("end time is NaN".into()));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ClockState {
                    clock: SimulationClock::new(end_time),
                    waits: WaitScheduler::new(),
                    gate: FreezeGate::new(),
                    granularity,
                }),
                thawed: Notify::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.lock().clock.now()
    }

    pub fn end_time(&self) -> SimTime {
        self.lock().clock.end_time()
    }

    /// Move the end of the run. Participants use this to signal "done soon".
    pub fn set_end_time(&self, end_time: SimTime) {
        self.lock().clock.set_end_time(end_time);
        tracing::debug!(end_time, "end time updated");
    }

    pub fn granularity(&self) -> SimTime {
        self.lock().granularity
    }

    pub fn is_running(&self) -> bool {
        self.lock().clock.is_running()
    }

    /// All loops poll this to decide whether the run is still on.
    pub fn should_continue(&self) -> bool {
        self.lock().clock.should_continue()
    }

    /// Number of suspended waiters.
    pub fn pending_waits(&self) -> usize {
        self.lock().waits.len()
    }

    /// Suspend until simulated time reaches `t`.
    ///
    /// Returns at once if the clock is stopped or `t` is not in the future.
    /// Waiters still pending when the run ends are released with
    /// [`WakeReason::Shutdown`].
    pub async fn wait_until(&self, t: SimTime) -> WakeReason {
        let rx = {
            let mut state = self.lock();
            let now = state.clock.now();
            if !state.clock.is_running() || !(t > now) {
                return WakeReason::Immediate;
            }
            state.waits.register(t)
        };
        rx.await.unwrap_or(WakeReason::Shutdown)
    }

    /// [`wait_until`](Self::wait_until), then run `callback` and return its result.
    pub async fn wait_until_then<F, R>(&self, t: SimTime, callback: F) -> R
    where
        F: FnOnce(WakeReason) -> R,
    {
        let reason = self.wait_until(t).await;
        callback(reason)
    }

    /// Suspend for `delay` seconds of simulated time.
    pub fn wait(&self, delay: SimTime) -> impl Future<Output = WakeReason> + '_ {
        let target = self.now() + delay;
        self.wait_until(target)
    }

    /// [`wait`](Self::wait), then run `callback`.
    pub async fn wait_then<F, R>(&self, delay: SimTime, callback: F) -> R
    where
        F: FnOnce(WakeReason) -> R,
    {
        let reason = self.wait(delay).await;
        callback(reason)
    }

    /// Allocate a holder identity for use with [`freeze`](Self::freeze).
    pub fn new_holder(&self) -> HolderId {
        self.lock().gate.next_holder()
    }

    /// Add or remove `holder` from the freeze gate.
    ///
    /// Releasing the last holder wakes a controller blocked on the gate.
    pub fn freeze(&self, holder: HolderId, acquire: bool) {
        let thawed = {
            let mut state = self.lock();
            if acquire {
                state.gate.acquire(holder);
                false
            } else {
                state.gate.release(holder)
            }
        };
        if thawed {
            self.shared.thawed.notify_one();
        }
    }

    /// Freeze the clock until the returned guard is dropped.
    pub fn frozen(&self) -> FreezeGuard {
        let holder = {
            let mut state = self.lock();
            let holder = state.gate.next_holder();
            state.gate.acquire(holder);
            holder
        };
        FreezeGuard::new(self.clone(), holder)
    }

    pub fn is_frozen(&self) -> bool {
        self.lock().gate.is_frozen()
    }

    /// Resolve once no freeze holder remains.
    pub(crate) async fn thawed(&self) {
        loop {
            let notified = self.shared.thawed.notified();
            if !self.is_frozen() {
                return;
            }
            notified.await;
        }
    }

    /// Size of the next step: one quantum, or less if a waiter is due sooner.
    pub(crate) fn next_step(&self) -> Result<SimTime> {
        let state = self.lock();
        let now = state.clock.now();
        let step = match state.waits.earliest() {
            Some(t) if t - now < state.granularity => t - now,
            _ => state.granularity,
        };
        if !(step >= 0.0) {
            return Err(ClockError::NegativeStep { step, now });
        }
        Ok(step)
    }

    /// Apply a step and return the new time.
    pub(crate) fn commit_step(&self, step: SimTime) -> SimTime {
        let mut state = self.lock();
        state.clock.advance_by(step);
        state.clock.now()
    }

    /// Wake waiters due within half a quantum of now.
    pub(crate) fn wake_due(&self) -> Vec<Woken> {
        let mut state = self.lock();
        let deadline = state.clock.now() + state.granularity / 2.0;
        state.waits.wake_expired(deadline)
    }

    /// Stop the clock and release every waiter. Returns the end time.
    pub(crate) fn halt(&self) -> (SimTime, Vec<Woken>) {
        let mut state = self.lock();
        state.clock.stop();
        let released = state.waits.wake_all(WakeReason::Shutdown);
        (state.clock.end_time(), released)
    }

    /// Stop the run from outside the controller.
    ///
    /// The controller notices on its next step and performs the shutdown.
    pub fn stop(&self) {
        self.lock().clock.stop();
        tracing::info!("clock stop requested");
    }

    pub(crate) fn reset_time(&self) {
        self.lock().clock.reset();
    }
}
