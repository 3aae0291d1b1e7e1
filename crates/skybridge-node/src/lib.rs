//! Skybridge Node - a physics simulator and a network simulator on one timeline
//!
//! The node owns the simulated clock and the flow router and connects both to
//! the network simulator over line-oriented streams:
//!
//! ```text
//!   network simulator                         skybridge node
//!   ─────────────────                         ──────────────
//!   config line, step sizes, bye   <───────   ClockController
//!   ready tokens                   ───────>   ClockController
//!   "<id> SEND <size> <dst>"       <───────   EndPoint (one per participant)
//!   "<src> <dst> SEND|RECV ..."    ───────>   FlowRouter
//! ```
//!
//! Applications use a [`Participant`] to send framed messages and to pace
//! themselves against simulated time.

pub mod bridge;
pub mod config;
pub mod error;
pub mod participant;
pub mod session;

pub use bridge::{forward_directives, spawn_line_bridge, LineBridge, DEFAULT_LINE_CAPACITY};
pub use config::{IpcConfig, NetConfig};
pub use error::{Error, Result};
pub use participant::{BatchSend, Participant, Received};
pub use session::Session;
