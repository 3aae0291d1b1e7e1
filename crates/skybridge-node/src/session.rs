//! One co-simulation run: the clock, the router, and their loops.

use std::collections::HashMap;
use std::sync::Arc;

use skybridge_clock::{ClockConfig, ClockController, ClockHandle, PhysicsStepper, StepperLink};
use skybridge_router::{EndPoint, FlowRouter, RouterConfig, RouterError};
use skybridge_wire::{builtin_registry, Message, MessageRegistry};
use tokio::sync::mpsc;

use crate::config::NetConfig;
use crate::error::{Error, Result};
use crate::participant::Participant;

/// Everything one run shares.
///
/// Build it, hand out participants and endpoints, then consume it with
/// [`Session::run`].
pub struct Session {
    config: NetConfig,
    clock: ClockHandle,
    router: Arc<FlowRouter>,
    registry: Arc<MessageRegistry<Message>>,
    endpoints: HashMap<String, EndPoint>,
}

impl Session {
    /// Validate `config`, register the control station and every vehicle, and
    /// compile the router.
    pub fn new(config: NetConfig) -> Result<Self> {
        config.validate()?;
        let clock = ClockHandle::new(config.update_granularity, config.end_time())?;

        let router = Arc::new(FlowRouter::new());
        let mut endpoints = HashMap::new();
        for name in config.participants() {
            let endpoint = router.register(&name)?;
            endpoints.insert(name, endpoint);
        }
        router.compile()?;

        tracing::info!(
            "Session ready: {} participants, granularity {}, end time {}",
            endpoints.len(),
            config.update_granularity,
            config.end_time()
        );

        Ok(Self {
            config,
            clock,
            router,
            registry: Arc::new(builtin_registry()?),
            endpoints,
        })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    pub fn router(&self) -> &Arc<FlowRouter> {
        &self.router
    }

    /// Take the network-facing half of an endpoint. Each can be taken once.
    pub fn take_endpoint(&mut self, name: &str) -> Option<EndPoint> {
        self.endpoints.remove(name)
    }

    /// Application handle for a registered participant.
    pub fn participant(&self, name: &str) -> Result<Participant> {
        if !self.config.participants().iter().any(|p| p == name) {
            return Err(RouterError::UnknownEndpoint(name.to_string()).into());
        }
        Ok(Participant::new(
            name,
            self.clock.clone(),
            Arc::clone(&self.router),
            Arc::clone(&self.registry),
            self.config.tcp_snd_buf_size as usize,
        ))
    }

    /// Drive the run to completion.
    ///
    /// Sends the configuration line, synchronizes with the stepper, then runs
    /// the clock loop and the router loop together. A fatal router error stops
    /// the clock so the stepper still gets its `bye`.
    pub async fn run<P: PhysicsStepper>(
        self,
        physics: P,
        link: StepperLink,
        notices: mpsc::Receiver<String>,
        clock_config: ClockConfig,
        router_config: RouterConfig,
    ) -> Result<()> {
        link.replies
            .send(self.config.to_wire())
            .await
            .map_err(|_| Error::ChannelClosed("stepper"))?;
        tracing::info!("Sent network configuration");

        let mut controller = ClockController::new(self.clock.clone(), physics, link, clock_config);
        controller.sync_start().await?;

        let router = Arc::clone(&self.router);
        let clock = self.clock.clone();
        let router_task = tokio::spawn(async move {
            let result = router.run(notices, clock.clone(), router_config).await;
            if result.is_err() {
                clock.stop();
            }
            result
        });

        let clock_result = controller.run().await;
        if clock_result.is_err() {
            self.clock.stop();
        }
        let router_result = router_task.await?;

        clock_result?;
        router_result?;
        tracing::info!("Session finished at t={}", self.clock.now());
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("participants", &self.config.participants())
            .field("clock", &self.clock)
            .finish()
    }
}
