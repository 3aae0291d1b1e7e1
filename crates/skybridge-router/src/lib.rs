//! Skybridge Router - message delivery paced by the network simulator
//!
//! Every application message between two participants becomes a [`Flow`].
//! The router tells the network simulator to transmit the flow's bytes and
//! delivers the payload only after the simulator reports all of them
//! received, so simulated latency, loss and congestion shape when messages
//! arrive.
//!
//! # Example
//!
//! ```rust,ignore
//! use skybridge_router::{FlowRouter, RecvMode};
//!
//! let router = FlowRouter::new();
//! let a = router.register("A")?;
//! let gcs = router.register("GCS")?;
//! router.compile()?;
//!
//! router.send("A", "GCS", b"hello".to_vec())?;
//! // ... simulator reports "A GCS RECV 5" ...
//! let delivery = router.recv("GCS", RecvMode::Blocking).await?;
//! ```

mod endpoint;
mod error;
mod flow;
mod names;
mod notice;
mod router;

pub use endpoint::{Delivery, EndPoint};
pub use error::{Result, RouterError};
pub use flow::{Flow, FlowId, FlowReport};
pub use names::{validate_endpoint_name, validate_participant_name, CONTROL_STATION};
pub use notice::{Directive, FlowOp, ProgressNotice};
pub use router::{FlowRouter, RecvMode, RouterConfig, DEFAULT_IO_TIMEOUT};
