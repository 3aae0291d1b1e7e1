//! Skybridge node binary
//!
//! Listens for the network simulator, then runs the clock and the router
//! until the simulated end time.

use std::net::SocketAddr;

use anyhow::Context;
use skybridge_clock::{ClockConfig, FreeRunning, StepperLink};
use skybridge_node::{
    forward_directives, spawn_line_bridge, IpcConfig, NetConfig, Participant, Session,
    DEFAULT_LINE_CAPACITY,
};
use skybridge_router::{EndPoint, RecvMode, RouterConfig};
use skybridge_wire::Message;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Accept one connection on `addr` and bridge it.
async fn accept_bridge(addr: SocketAddr, label: &str) -> anyhow::Result<skybridge_node::LineBridge> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {} listener on {}", label, addr))?;
    tracing::info!("{} listening on {}", label, addr);
    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    tracing::info!("{} connected from {}", label, peer);
    Ok(spawn_line_bridge(stream, label, DEFAULT_LINE_CAPACITY))
}

/// Serve one endpoint's directive stream.
fn serve_endpoint(addr: SocketAddr, endpoint: EndPoint) {
    tokio::spawn(async move {
        let label = format!("endpoint {}", endpoint.name());
        match accept_bridge(addr, &label).await {
            Ok(bridge) => match forward_directives(endpoint, bridge.outbound).await {
                Ok(()) => tracing::debug!("{} directive stream ended", label),
                Err(e) => tracing::error!("{} directive task failed: {}", label, e),
            },
            Err(e) => tracing::error!("{} failed: {:#}", label, e),
        }
    });
}

/// Log everything the control station receives.
fn log_control_station(mut gcs: Participant) {
    tokio::spawn(async move {
        loop {
            match gcs.rx(RecvMode::Blocking).await {
                Ok(Some(received)) => match &received.message {
                    Message::Raw(raw) => tracing::info!(
                        "GCS got {} bytes from {} (flow {}) at t={}",
                        raw.0.len(),
                        received.src,
                        received.flow_id,
                        gcs.clock().now()
                    ),
                    Message::Image(image) => tracing::info!(
                        "GCS got image from {} taken at t={}, delay {}",
                        received.src,
                        image.timestamp,
                        gcs.clock().now() - image.timestamp
                    ),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("GCS receive failed: {}", e);
                    break;
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skybridge=info,skybridge_node=info,skybridge_clock=info,skybridge_router=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Skybridge node");

    let ipc = IpcConfig::from_env()?;
    let config = NetConfig::from_file(&ipc.settings_path)
        .with_context(|| format!("loading {}", ipc.settings_path.display()))?;
    let mut session = Session::new(config)?;

    let vehicles = session.config().vehicles.clone();
    if let Some(endpoint) = session.take_endpoint(skybridge_router::CONTROL_STATION) {
        serve_endpoint(ipc.gcs_addr(), endpoint);
    }
    for (index, name) in vehicles.iter().enumerate() {
        if let Some(endpoint) = session.take_endpoint(name) {
            serve_endpoint(ipc.vehicle_addr(index)?, endpoint);
        }
    }
    log_control_station(session.participant(skybridge_router::CONTROL_STATION)?);

    let (stepper, notices) = tokio::try_join!(
        accept_bridge(ipc.stepper_addr, "stepper"),
        accept_bridge(ipc.notice_addr, "notices"),
    )?;

    // Notices are inbound only; keep the write side open until the run ends.
    let _notice_sink = notices.outbound;

    session
        .run(
            FreeRunning,
            StepperLink::new(stepper.inbound, stepper.outbound),
            notices.inbound,
            ClockConfig::default(),
            RouterConfig::default(),
        )
        .await?;

    tracing::info!("Skybridge node stopped");
    Ok(())
}
