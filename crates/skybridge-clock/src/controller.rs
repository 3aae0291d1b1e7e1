//! Step loop keeping the simulated clock in lockstep with the external stepper.
//!
//! One step:
//! 1. wait until no freeze holder remains
//! 2. wait (bounded) for the stepper's ready token
//! 3. pick `min(granularity, earliest_wait - now)`
//! 4. advance the physical simulator by that step
//! 5. commit the step to the clock
//! 6. reply to the stepper with the step taken
//! 7. wake waiters due within half a quantum

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::clock::SimTime;
use crate::error::{ClockError, Result};
use crate::handle::ClockHandle;

/// Default wait for a ready token before logging and retrying.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(1000);

/// The physical/rendering simulator, advanced in explicit steps.
#[async_trait]
pub trait PhysicsStepper: Send {
    /// Run the simulator for `step` seconds of simulated time, then pause.
    async fn continue_for(&mut self, step: SimTime) -> anyhow::Result<()>;

    /// Bring the simulator to its initial state before the first step.
    async fn reset(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A simulator with nothing to advance. Used when only the network side runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeRunning;

#[async_trait]
impl PhysicsStepper for FreeRunning {
    async fn continue_for(&mut self, _step: SimTime) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Channels to the external event stepper.
#[derive(Debug)]
pub struct StepperLink {
    /// Ready tokens; content is ignored.
    pub ready: mpsc::Receiver<String>,
    /// Step replies and the final `bye`.
    pub replies: mpsc::Sender<String>,
}

impl StepperLink {
    pub fn new(ready: mpsc::Receiver<String>, replies: mpsc::Sender<String>) -> Self {
        Self { ready, replies }
    }
}

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// How long to wait for a ready token before retrying.
    pub ready_timeout: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

impl ClockConfig {
    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

/// Outcome of one [`ClockController::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
    /// The clock moved forward.
    Stepped { step: SimTime, now: SimTime, woken: usize },
    /// No ready token arrived in time; nothing changed.
    TimedOut,
    /// The run is over; shutdown has been performed.
    Stopped,
}

/// Drives the step loop.
pub struct ClockController<P> {
    clock: ClockHandle,
    physics: P,
    link: StepperLink,
    config: ClockConfig,
    shut_down: bool,
}

impl<P: PhysicsStepper> ClockController<P> {
    pub fn new(clock: ClockHandle, physics: P, link: StepperLink, config: ClockConfig) -> Self {
        Self {
            clock,
            physics,
            link,
            config,
            shut_down: false,
        }
    }

    pub fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    /// Wait for the stepper's first token, reset the simulator, and rewind to zero.
    pub async fn sync_start(&mut self) -> Result<()> {
        self.link.ready.recv().await.ok_or(ClockError::StepperClosed)?;
        self.physics.reset().await?;
        self.clock.reset_time();
        tracing::info!("synchronized start with stepper");
        Ok(())
    }

    /// Perform one step, or the shutdown if the run is over.
    pub async fn advance(&mut self) -> Result<Advance> {
        if !self.clock.should_continue() {
            self.shutdown().await;
            return Ok(Advance::Stopped);
        }

        self.clock.thawed().await;

        match tokio::time::timeout(self.config.ready_timeout, self.link.ready.recv()).await {
            Err(_) => {
                tracing::debug!(now = self.clock.now(), "ready token not received, retrying");
                return Ok(Advance::TimedOut);
            }
            Ok(None) => return Err(ClockError::StepperClosed),
            Ok(Some(_token)) => {}
        }

        let step = self.clock.next_step()?;
        self.physics.continue_for(step).await?;
        let now = self.clock.commit_step(step);

        self.link
            .replies
            .send(step.to_string())
            .await
            .map_err(|_| ClockError::StepperClosed)?;

        let woken = self.clock.wake_due();
        tracing::trace!(step, now, woken = woken.len(), "clock advanced");

        Ok(Advance::Stepped {
            step,
            now,
            woken: woken.len(),
        })
    }

    /// Step until the run ends. Waiters are released on every exit path.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            granularity = self.clock.granularity(),
            end_time = self.clock.end_time(),
            "clock loop started"
        );

        loop {
            match self.advance().await {
                Ok(Advance::Stopped) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("clock loop failed: {}", e);
                    self.shutdown().await;
                    return Err(e);
                }
            }
        }

        tracing::info!(now = self.clock.now(), "clock loop finished");
        Ok(())
    }

    /// Stop the clock, send `bye <end_time>`, and release every waiter.
    ///
    /// Idempotent; only the first call talks to the stepper.
    pub async fn shutdown(&mut self) {
        let (end_time, released) = self.clock.halt();
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.link.replies.send(format!("bye {end_time}")).await.is_err() {
            tracing::warn!("stepper gone before shutdown notice");
        }
        tracing::info!(end_time, released = released.len(), "simulation stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::WakeReason;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_pending, assert_ready, task};

    struct Harness {
        ready: mpsc::Sender<String>,
        replies: mpsc::Receiver<String>,
        controller: ClockController<FreeRunning>,
    }

    fn harness(granularity: SimTime, end_time: SimTime) -> Harness {
        let clock = ClockHandle::new(granularity, end_time).unwrap();
        let (ready_tx, ready_rx) = mpsc::channel(64);
        let (reply_tx, reply_rx) = mpsc::channel(64);
        let controller = ClockController::new(
            clock,
            FreeRunning,
            StepperLink::new(ready_rx, reply_tx),
            ClockConfig::default(),
        );
        Harness {
            ready: ready_tx,
            replies: reply_rx,
            controller,
        }
    }

    #[derive(Default)]
    struct Recording {
        steps: Arc<Mutex<Vec<SimTime>>>,
        resets: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl PhysicsStepper for Recording {
        async fn continue_for(&mut self, step: SimTime) -> anyhow::Result<()> {
            self.steps.lock().unwrap().push(step);
            Ok(())
        }

        async fn reset(&mut self) -> anyhow::Result<()> {
            *self.resets.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl PhysicsStepper for Broken {
        async fn continue_for(&mut self, _step: SimTime) -> anyhow::Result<()> {
            anyhow::bail!("simulator disconnected")
        }
    }

    #[tokio::test]
    async fn steps_one_quantum_and_replies() {
        let mut h = harness(0.5, f64::INFINITY);
        h.ready.send("go".into()).await.unwrap();

        let outcome = h.controller.advance().await.unwrap();
        assert_eq!(
            outcome,
            Advance::Stepped {
                step: 0.5,
                now: 0.5,
                woken: 0
            }
        );
        assert_eq!(h.replies.recv().await.unwrap(), "0.5");
        assert_eq!(h.controller.clock().now(), 0.5);
    }

    #[tokio::test]
    async fn step_shrinks_to_the_earliest_waiter() {
        let mut h = harness(1.0, f64::INFINITY);
        let clock = h.controller.clock().clone();
        let mut waiter = task::spawn(clock.wait_until(0.25));
        assert_pending!(waiter.poll());

        h.ready.send(String::new()).await.unwrap();
        let outcome = h.controller.advance().await.unwrap();
        assert_eq!(
            outcome,
            Advance::Stepped {
                step: 0.25,
                now: 0.25,
                woken: 1
            }
        );
        assert_eq!(h.replies.recv().await.unwrap(), "0.25");
        assert_ready!(waiter.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn ready_timeout_is_transient() {
        let mut h = harness(1.0, f64::INFINITY);

        assert_eq!(h.controller.advance().await.unwrap(), Advance::TimedOut);
        assert_eq!(h.controller.clock().now(), 0.0);
        assert!(h.replies.try_recv().is_err());

        h.ready.send(String::new()).await.unwrap();
        assert!(matches!(
            h.controller.advance().await.unwrap(),
            Advance::Stepped { .. }
        ));
    }

    #[tokio::test]
    async fn closed_stepper_is_fatal() {
        let mut h = harness(1.0, f64::INFINITY);
        drop(h.ready);
        assert!(matches!(
            h.controller.advance().await,
            Err(ClockError::StepperClosed)
        ));
    }

    #[tokio::test]
    async fn wake_order_follows_time_then_registration() {
        let mut h = harness(1.0, f64::INFINITY);
        let clock = h.controller.clock().clone();
        let order = Arc::new(Mutex::new(Vec::new()));

        let targets = [3.0, 1.0, 2.0, 1.0];
        let mut tasks = Vec::new();
        for (i, &t) in targets.iter().enumerate() {
            let waiter = clock.clone();
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                waiter.wait_until(t).await;
                order.lock().unwrap().push(i);
            }));
            while clock.pending_waits() < i + 1 {
                tokio::task::yield_now().await;
            }
        }

        for _ in 0..3 {
            h.ready.send(String::new()).await.unwrap();
            h.controller.advance().await.unwrap();
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
        }

        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 3, 2, 0]);
    }

    #[tokio::test]
    async fn freeze_blocks_advance_with_single_holder() {
        let mut h = harness(1.0, f64::INFINITY);
        let clock = h.controller.clock().clone();
        h.ready.send(String::new()).await.unwrap();

        let guard = clock.frozen();
        let before = clock.now();
        {
            let mut adv = task::spawn(h.controller.advance());
            assert_pending!(adv.poll());
            assert_eq!(clock.now(), before);

            drop(guard);
            assert!(adv.is_woken());
            assert!(matches!(assert_ready!(adv.poll()), Ok(Advance::Stepped { .. })));
        }
        assert_eq!(clock.now(), before + 1.0);
    }

    #[tokio::test]
    async fn freeze_with_many_holders_released_in_any_order() {
        for release_first in [0usize, 1, 2] {
            let mut h = harness(1.0, f64::INFINITY);
            let clock = h.controller.clock().clone();
            h.ready.send(String::new()).await.unwrap();

            let mut guards: Vec<Option<_>> = (0..3).map(|_| Some(clock.frozen())).collect();
            let before = clock.now();

            let mut adv = task::spawn(h.controller.advance());
            assert_pending!(adv.poll());

            let mut order = vec![release_first];
            order.extend((0..3).filter(|&i| i != release_first).rev());
            for (n, idx) in order.into_iter().enumerate() {
                guards[idx].take();
                if n < 2 {
                    assert_pending!(adv.poll());
                    assert_eq!(clock.now(), before);
                }
            }

            assert!(matches!(assert_ready!(adv.poll()), Ok(Advance::Stepped { .. })));
        }
    }

    #[tokio::test]
    async fn freeze_scope_leaves_time_unchanged() {
        let h = harness(0.01, f64::INFINITY);
        let clock = h.controller.clock().clone();
        let before = clock.now();
        {
            let _a = clock.frozen();
            let _b = clock.frozen();
        }
        assert_eq!(clock.now(), before);
        assert!(!clock.is_frozen());
    }

    #[tokio::test]
    async fn end_time_forces_shutdown_of_all_waiters() {
        let mut h = harness(1.0, f64::INFINITY);
        let clock = h.controller.clock().clone();

        let mut waiters = Vec::new();
        for t in [5.0, 10.0, 15.0] {
            let clock = clock.clone();
            waiters.push(tokio::spawn(async move { clock.wait_until(t).await }));
        }
        while clock.pending_waits() < 3 {
            tokio::task::yield_now().await;
        }

        for _ in 0..3 {
            h.ready.send(String::new()).await.unwrap();
            h.controller.advance().await.unwrap();
        }
        assert_eq!(clock.now(), 3.0);
        assert_eq!(clock.pending_waits(), 3);

        clock.set_end_time(3.0);
        assert!(!clock.should_continue());
        assert_eq!(h.controller.advance().await.unwrap(), Advance::Stopped);

        for w in waiters {
            assert_eq!(w.await.unwrap(), WakeReason::Shutdown);
        }
        let replies: Vec<String> = std::iter::from_fn(|| h.replies.try_recv().ok()).collect();
        assert_eq!(replies, vec!["1", "1", "1", "bye 3"]);
    }

    #[tokio::test]
    async fn run_stops_at_end_time_and_says_bye() {
        let mut h = harness(0.5, 1.0);
        for _ in 0..4 {
            h.ready.send(String::new()).await.unwrap();
        }
        let clock = h.controller.clock().clone();

        h.controller.run().await.unwrap();
        assert_eq!(clock.now(), 1.0);
        assert!(!clock.is_running());

        let replies: Vec<String> = std::iter::from_fn(|| h.replies.try_recv().ok()).collect();
        assert_eq!(replies, vec!["0.5", "0.5", "bye 1"]);
    }

    #[tokio::test]
    async fn infinite_end_time_renders_as_inf() {
        let mut h = harness(0.5, f64::INFINITY);
        h.controller.clock().stop();
        assert_eq!(h.controller.advance().await.unwrap(), Advance::Stopped);
        assert_eq!(h.replies.recv().await.unwrap(), "bye inf");

        // A second shutdown does not repeat the notice.
        assert_eq!(h.controller.advance().await.unwrap(), Advance::Stopped);
        assert!(h.replies.try_recv().is_err());
    }

    #[tokio::test]
    async fn physics_failure_still_releases_waiters() {
        let clock = ClockHandle::new(1.0, f64::INFINITY).unwrap();
        let (ready_tx, ready_rx) = mpsc::channel(4);
        let (reply_tx, mut reply_rx) = mpsc::channel(4);
        let controller = ClockController::new(
            clock.clone(),
            Broken,
            StepperLink::new(ready_rx, reply_tx),
            ClockConfig::default(),
        );

        let waiter = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.wait_until(10.0).await })
        };
        while clock.pending_waits() < 1 {
            tokio::task::yield_now().await;
        }

        ready_tx.send(String::new()).await.unwrap();
        assert!(matches!(controller.run().await, Err(ClockError::Physics(_))));
        assert_eq!(waiter.await.unwrap(), WakeReason::Shutdown);
        assert_eq!(reply_rx.recv().await.unwrap(), "bye inf");
    }

    #[tokio::test]
    async fn sync_start_resets_physics_and_time() {
        let clock = ClockHandle::new(1.0, f64::INFINITY).unwrap();
        let (ready_tx, ready_rx) = mpsc::channel(4);
        let (reply_tx, _reply_rx) = mpsc::channel(4);
        let physics = Recording::default();
        let steps = Arc::clone(&physics.steps);
        let resets = Arc::clone(&physics.resets);
        let mut controller = ClockController::new(
            clock.clone(),
            physics,
            StepperLink::new(ready_rx, reply_tx),
            ClockConfig::default(),
        );

        ready_tx.send("start".into()).await.unwrap();
        controller.sync_start().await.unwrap();
        assert_eq!(*resets.lock().unwrap(), 1);
        assert_eq!(clock.now(), 0.0);

        ready_tx.send(String::new()).await.unwrap();
        controller.advance().await.unwrap();
        assert_eq!(*steps.lock().unwrap(), vec![1.0]);
    }
}
