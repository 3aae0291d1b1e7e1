//! Skybridge Clock - one simulated timeline shared by every participant
//!
//! The clock advances only when the external event stepper says it is ready,
//! and only in bounded quanta. Participants pace themselves with
//! [`ClockHandle::wait_until`]; expensive in-simulation work can pause the
//! clock with a [`FreezeGuard`].
//!
//! # Components
//!
//! - [`SimulationClock`]: `now`, `end_time`, `running`
//! - [`WaitScheduler`]: waiters ordered by `(wake_time, sequence)`
//! - [`FreezeGate`]: holders that block advancement
//! - [`ClockController`]: the step loop
//!
//! # Example
//!
//! ```rust,ignore
//! use skybridge_clock::{ClockConfig, ClockController, ClockHandle, FreeRunning, StepperLink};
//!
//! let clock = ClockHandle::new(0.01, 30.0)?;
//! let controller = ClockController::new(clock.clone(), FreeRunning, link, ClockConfig::default());
//! tokio::spawn(controller.run());
//!
//! clock.wait(1.0).await;
//! {
//!     let _frozen = clock.frozen();
//!     capture_frame().await;
//! }
//! ```

mod clock;
mod controller;
mod error;
mod freeze;
mod handle;
mod scheduler;

pub use async_trait::async_trait;
pub use clock::{SimTime, SimulationClock};
pub use controller::{
    Advance, ClockConfig, ClockController, FreeRunning, PhysicsStepper, StepperLink,
    DEFAULT_READY_TIMEOUT,
};
pub use error::{ClockError, Result};
pub use freeze::{FreezeGate, FreezeGuard, HolderId};
pub use handle::ClockHandle;
pub use scheduler::{WaitScheduler, WakeReason, Woken};
