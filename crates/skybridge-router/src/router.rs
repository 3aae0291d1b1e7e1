//! The flow router.
//!
//! Applications hand the router whole payloads. The router asks the network
//! simulator to move the bytes, then accounts the simulator's SEND/RECV
//! progress notices against the flows in flight. A payload is delivered to its
//! destination inbox only when every byte has been reported received.
//!
//! Flows between the same `(src, dst)` pair complete in start order: receive
//! credit is applied to the oldest flow first and spills over to the next.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use skybridge_clock::ClockHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::endpoint::{Delivery, EndPoint, Inbox, Route};
use crate::error::{Result, RouterError};
use crate::flow::{Flow, FlowId, FlowReport};
use crate::names::validate_endpoint_name;
use crate::notice::{Directive, FlowOp, ProgressNotice};

/// How long the notice loop waits for a line before re-checking the clock.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(1000);

/// Router loop settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub io_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

impl RouterConfig {
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }
}

/// How `recv` behaves when the inbox is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvMode {
    /// Return `None` immediately.
    NonBlocking,
    /// Wait until a delivery arrives.
    Blocking,
    /// Wait at most this long.
    Timeout(Duration),
}

#[derive(Debug, Default)]
struct Tables {
    routes: HashMap<String, Route>,
    /// src -> dst -> flows in start order
    pairs: HashMap<String, HashMap<String, VecDeque<Flow>>>,
    live: HashMap<FlowId, Flow>,
    next_id: u64,
    compiled: bool,
}

impl Tables {
    fn queue_mut(&mut self, src: &str, dst: &str) -> Result<&mut VecDeque<Flow>> {
        if !self.routes.contains_key(src) {
            return Err(RouterError::UnknownEndpoint(src.to_string()));
        }
        self.pairs
            .get_mut(src)
            .and_then(|row| row.get_mut(dst))
            .ok_or_else(|| RouterError::UnknownEndpoint(dst.to_string()))
    }

    fn deliver(&self, flow: &Flow, id: FlowId) {
        if let Some(route) = self.routes.get(flow.dst()) {
            route.inbox.push(Delivery {
                src: flow.src().to_string(),
                flow_id: id,
                payload: flow.payload().clone(),
            });
        }
    }
}

/// Byte-accounted message router between named endpoints.
#[derive(Debug, Default)]
pub struct FlowRouter {
    tables: Mutex<Tables>,
}

impl FlowRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an endpoint. Only allowed before [`FlowRouter::compile`].
    pub fn register(&self, name: &str) -> Result<EndPoint> {
        validate_endpoint_name(name)?;
        let mut tables = self.lock();
        if tables.compiled {
            return Err(RouterError::AlreadyCompiled);
        }
        if tables.routes.contains_key(name) {
            return Err(RouterError::DuplicateEndpoint(name.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tables.routes.insert(
            name.to_string(),
            Route {
                directives: tx,
                inbox: Arc::new(Inbox::new()),
            },
        );
        debug!("Registered endpoint {}", name);
        Ok(EndPoint::new(name.to_string(), rx))
    }

    /// Freeze the endpoint set and build a queue for every ordered pair.
    pub fn compile(&self) -> Result<()> {
        let mut tables = self.lock();
        if tables.compiled {
            return Err(RouterError::AlreadyCompiled);
        }

        let names: Vec<String> = tables.routes.keys().cloned().collect();
        let mut pairs = HashMap::with_capacity(names.len());
        for src in &names {
            let row: HashMap<String, VecDeque<Flow>> = names
                .iter()
                .map(|dst| (dst.clone(), VecDeque::new()))
                .collect();
            pairs.insert(src.clone(), row);
        }
        tables.pairs = pairs;
        tables.compiled = true;
        info!("Router compiled with {} endpoints", names.len());
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.lock().compiled
    }

    /// Endpoint names, sorted.
    pub fn endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().routes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Assign the next id, queue the flow, and tell the network side to send it.
    ///
    /// The id is only consumed once the directive is out. A flow whose
    /// directive could not be sent stays unstarted and can be retried.
    pub fn start_flow(&self, flow: &Flow) -> Result<FlowId> {
        let mut tables = self.lock();
        if let Some(id) = flow.id() {
            return Err(RouterError::AlreadyStarted(id));
        }
        if !tables.compiled {
            return Err(RouterError::NotCompiled);
        }
        let queue_was_empty = tables.queue_mut(flow.src(), flow.dst())?.is_empty();
        let directives = match tables.routes.get(flow.src()) {
            Some(route) => route.directives.clone(),
            None => return Err(RouterError::UnknownEndpoint(flow.src().to_string())),
        };

        let id = FlowId(tables.next_id);
        directives
            .send(Directive {
                flow_id: id,
                size: flow.size(),
                dst: flow.dst().to_string(),
            })
            .map_err(|_| RouterError::DirectiveChannelClosed(flow.src().to_string()))?;
        // Ids are only assigned under the table lock.
        flow.assign_id(id)?;
        tables.next_id += 1;

        if flow.size() == 0 && queue_was_empty {
            // Nothing will ever be reported for an empty payload.
            tables.deliver(flow, id);
            debug!("Delivered empty flow {} {} -> {}", id, flow.src(), flow.dst());
            return Ok(id);
        }

        tables.queue_mut(flow.src(), flow.dst())?.push_back(flow.clone());
        tables.live.insert(id, flow.clone());
        trace!("Started {}", flow);
        Ok(id)
    }

    /// Build a flow for `payload` and start it.
    pub fn send(&self, src: &str, dst: &str, payload: impl Into<bytes::Bytes>) -> Result<Flow> {
        let flow = Flow::new(src, dst, payload);
        self.start_flow(&flow)?;
        Ok(flow)
    }

    /// Account bytes the network reports as sent. Unknown ids are stale and ignored.
    pub fn on_send_progress(&self, src: &str, dst: &str, id: FlowId, size: u64) -> Result<()> {
        let tables = self.lock();
        if !tables.compiled {
            return Err(RouterError::NotCompiled);
        }
        let Some(flow) = tables.live.get(&id) else {
            trace!("Ignoring SEND progress for finished flow {}", id);
            return Ok(());
        };
        if flow.src() != src || flow.dst() != dst {
            return Err(RouterError::PairMismatch {
                flow: id,
                expected: format!("{} -> {}", flow.src(), flow.dst()),
                reported: format!("{} -> {}", src, dst),
            });
        }
        flow.credit_sent(size)?;
        Ok(())
    }

    /// Apply received bytes to the pair's flows, oldest first.
    ///
    /// Returns the ids of the flows completed and delivered by this notice. A
    /// notice naming an id that is no longer live is stale and ignored.
    pub fn on_recv_progress(
        &self,
        src: &str,
        dst: &str,
        size: u64,
        id: Option<FlowId>,
    ) -> Result<Vec<FlowId>> {
        let mut tables = self.lock();
        if !tables.compiled {
            return Err(RouterError::NotCompiled);
        }
        if let Some(id) = id {
            if !tables.live.contains_key(&id) {
                trace!("Ignoring RECV progress for finished flow {}", id);
                return Ok(Vec::new());
            }
        }

        let mut remaining = size;
        let mut completed = Vec::new();
        loop {
            let queue = tables.queue_mut(src, dst)?;
            let Some(head) = queue.front() else { break };
            if remaining > 0 {
                remaining -= head.credit_received(remaining);
            }
            if !head.is_complete() {
                break;
            }
            let Some(flow) = queue.pop_front() else { break };
            let Some(flow_id) = flow.id() else { continue };
            tables.live.remove(&flow_id);
            tables.deliver(&flow, flow_id);
            debug!("Delivered flow {} {} -> {} ({} bytes)", flow_id, src, dst, flow.size());
            completed.push(flow_id);
        }

        if remaining > 0 {
            return Err(RouterError::RecvOverflow {
                src: src.to_string(),
                dst: dst.to_string(),
                surplus: remaining,
            });
        }
        Ok(completed)
    }

    /// Parse one notice line and apply it.
    pub fn apply_notice(&self, line: &str) -> Result<()> {
        let notice: ProgressNotice = line.parse()?;
        match notice.op {
            FlowOp::Send => {
                let id = notice.flow_id.ok_or_else(|| RouterError::Malformed {
                    notice: line.to_string(),
                    reason: "SEND notice needs a flow id".to_string(),
                })?;
                self.on_send_progress(&notice.src, &notice.dst, id, notice.size)
            }
            FlowOp::Recv => self
                .on_recv_progress(&notice.src, &notice.dst, notice.size, notice.flow_id)
                .map(|_| ()),
        }
    }

    /// Take the next delivery for `dst`.
    pub async fn recv(&self, dst: &str, mode: RecvMode) -> Result<Option<Delivery>> {
        let inbox = {
            let tables = self.lock();
            let route = tables
                .routes
                .get(dst)
                .ok_or_else(|| RouterError::UnknownEndpoint(dst.to_string()))?;
            Arc::clone(&route.inbox)
        };

        let delivery = match mode {
            RecvMode::NonBlocking => match inbox.receiver().try_lock() {
                Ok(mut rx) => rx.try_recv().ok(),
                Err(_) => None,
            },
            RecvMode::Blocking => inbox.receiver().lock().await.recv().await,
            RecvMode::Timeout(limit) => {
                let mut rx = inbox.receiver().lock().await;
                tokio::time::timeout(limit, rx.recv()).await.ok().flatten()
            }
        };
        Ok(delivery)
    }

    /// Flows still in flight, in id order.
    pub fn unresolved(&self) -> Vec<FlowReport> {
        let tables = self.lock();
        let mut reports: Vec<FlowReport> = tables
            .live
            .iter()
            .map(|(id, flow)| FlowReport::of(flow, *id))
            .collect();
        reports.sort_by_key(|report| report.id);
        reports
    }

    fn report_unresolved(&self) {
        let unresolved = self.unresolved();
        if unresolved.is_empty() {
            return;
        }
        warn!("{} flows still in flight", unresolved.len());
        for report in &unresolved {
            warn!(
                "  flow {} {} -> {}: sent {}/{} received {}/{}",
                report.id,
                report.src,
                report.dst,
                report.bytes_sent,
                report.size,
                report.bytes_received,
                report.size
            );
        }
    }

    /// Consume notice lines until the clock stops, the channel closes, or a
    /// notice violates the accounting rules.
    ///
    /// A read timeout only re-checks the clock. Any error from a notice is
    /// fatal and returned after logging.
    pub async fn run(
        &self,
        mut notices: mpsc::Receiver<String>,
        clock: ClockHandle,
        config: RouterConfig,
    ) -> Result<()> {
        info!("Router loop started");
        while clock.should_continue() {
            let line = match tokio::time::timeout(config.io_timeout, notices.recv()).await {
                Err(_) => {
                    debug!("No notice within {:?}", config.io_timeout);
                    continue;
                }
                Ok(None) => {
                    info!("Notice channel closed");
                    break;
                }
                Ok(Some(line)) => line,
            };
            trace!("Notice: {}", line.trim_end());
            if let Err(e) = self.apply_notice(&line) {
                error!("Router stopping on bad notice: {}", e);
                self.report_unresolved();
                return Err(e);
            }
        }
        self.report_unresolved();
        info!("Router loop finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::CONTROL_STATION;
    use tokio_test::{assert_pending, assert_ready, task};

    fn compiled(names: &[&str]) -> (FlowRouter, HashMap<String, EndPoint>) {
        let router = FlowRouter::new();
        let endpoints = names
            .iter()
            .map(|name| (name.to_string(), router.register(name).unwrap()))
            .collect();
        router.compile().unwrap();
        (router, endpoints)
    }

    #[test]
    fn register_rules() {
        let router = FlowRouter::new();
        router.register("A").unwrap();
        assert!(matches!(
            router.register("A"),
            Err(RouterError::DuplicateEndpoint(_))
        ));
        assert!(matches!(
            router.register("bad name"),
            Err(RouterError::InvalidName { .. })
        ));
        router.compile().unwrap();
        assert!(matches!(router.register("B"), Err(RouterError::AlreadyCompiled)));
        assert!(matches!(router.compile(), Err(RouterError::AlreadyCompiled)));
    }

    #[test]
    fn start_requires_compile() {
        let router = FlowRouter::new();
        router.register("A").unwrap();
        router.register("B").unwrap();
        assert!(matches!(
            router.send("A", "B", vec![1u8; 4]),
            Err(RouterError::NotCompiled)
        ));
    }

    #[test]
    fn ids_increase_and_directives_are_emitted() {
        let (router, mut endpoints) = compiled(&["A", "B"]);
        let first = router.send("A", "B", vec![0u8; 10]).unwrap();
        let second = router.send("B", "A", vec![0u8; 20]).unwrap();
        assert_eq!(first.id(), Some(FlowId(0)));
        assert_eq!(second.id(), Some(FlowId(1)));

        let a = endpoints.get_mut("A").unwrap();
        assert_eq!(a.try_next_directive().unwrap().to_string(), "0 SEND 10 B");
        assert!(a.try_next_directive().is_none());
        let b = endpoints.get_mut("B").unwrap();
        assert_eq!(b.try_next_directive().unwrap().to_string(), "1 SEND 20 A");
    }

    #[test]
    fn restarting_a_flow_fails() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        let flow = router.send("A", "B", vec![0u8; 10]).unwrap();
        assert!(matches!(
            router.start_flow(&flow),
            Err(RouterError::AlreadyStarted(FlowId(0)))
        ));
    }

    #[test]
    fn unknown_destination() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        assert!(matches!(
            router.send("A", "C", vec![0u8; 10]),
            Err(RouterError::UnknownEndpoint(name)) if name == "C"
        ));
    }

    #[tokio::test]
    async fn endpoint_may_send_to_itself() {
        let (router, mut endpoints) = compiled(&["A", "B"]);
        let flow = router.send("A", "A", vec![7u8; 4]).unwrap();
        let directive = endpoints.get_mut("A").unwrap().try_next_directive().unwrap();
        assert_eq!(directive.to_string(), "0 SEND 4 A");

        assert_eq!(router.on_recv_progress("A", "A", 4, None).unwrap(), vec![FlowId(0)]);
        assert!(flow.is_complete());
        let delivery = router.recv("A", RecvMode::NonBlocking).await.unwrap().unwrap();
        assert_eq!(delivery.src, "A");
        assert_eq!(&delivery.payload[..], &[7, 7, 7, 7]);
    }

    #[test]
    fn failed_directive_leaves_flow_unstarted() {
        let (router, mut endpoints) = compiled(&["A", "B"]);
        let a = endpoints.remove("A").unwrap();
        drop(a);

        let flow = Flow::new("A", "B", vec![0u8; 10]);
        assert!(matches!(
            router.start_flow(&flow),
            Err(RouterError::DirectiveChannelClosed(name)) if name == "A"
        ));
        assert_eq!(flow.id(), None);
        assert!(router.unresolved().is_empty());
        assert!(matches!(
            router.start_flow(&flow),
            Err(RouterError::DirectiveChannelClosed(_))
        ));

        // The failed attempts did not consume an id.
        let from_b = router.send("B", "A", vec![0u8; 3]).unwrap();
        assert_eq!(from_b.id(), Some(FlowId(0)));
        assert_eq!(router.unresolved().len(), 1);
    }

    #[tokio::test]
    async fn receive_credit_spills_over_in_order() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        let first = router.send("A", "B", vec![1u8; 600]).unwrap();
        let second = router.send("A", "B", vec![2u8; 400]).unwrap();

        let done = router.on_recv_progress("A", "B", 700, None).unwrap();
        assert_eq!(done, vec![FlowId(0)]);
        assert!(first.is_complete());
        assert_eq!(second.bytes_received(), 100);

        let delivery = router.recv("B", RecvMode::NonBlocking).await.unwrap().unwrap();
        assert_eq!(delivery.flow_id, FlowId(0));
        assert_eq!(delivery.src, "A");
        assert_eq!(delivery.payload.len(), 600);
        assert!(router.recv("B", RecvMode::NonBlocking).await.unwrap().is_none());

        let done = router.on_recv_progress("A", "B", 300, None).unwrap();
        assert_eq!(done, vec![FlowId(1)]);
        let delivery = router.recv("B", RecvMode::NonBlocking).await.unwrap().unwrap();
        assert_eq!(delivery.flow_id, FlowId(1));
        assert!(delivery.payload.iter().all(|b| *b == 2));
        assert!(router.unresolved().is_empty());
    }

    #[test]
    fn stale_notices_are_ignored() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        router.send("A", "B", vec![0u8; 8]).unwrap();
        router.on_recv_progress("A", "B", 8, None).unwrap();

        router.on_send_progress("A", "B", FlowId(0), 8).unwrap();
        assert!(router.on_recv_progress("A", "B", 8, Some(FlowId(0))).unwrap().is_empty());
        router.apply_notice("A B SEND 4 99").unwrap();
    }

    #[test]
    fn stale_notices_leave_live_flows_alone() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        let done = router.send("A", "B", vec![0u8; 8]).unwrap();
        router.apply_notice("A B SEND 8 0").unwrap();
        router.on_recv_progress("A", "B", 8, Some(FlowId(0))).unwrap();
        assert!(done.is_complete());

        let live = router.send("A", "B", vec![0u8; 16]).unwrap();
        assert_eq!(live.id(), Some(FlowId(1)));

        router.apply_notice("A B SEND 8 0").unwrap();
        assert!(router.on_recv_progress("A", "B", 8, Some(FlowId(0))).unwrap().is_empty());
        router.apply_notice("A B RECV 8 0").unwrap();

        assert_eq!(live.bytes_sent(), 0);
        assert_eq!(live.bytes_received(), 0);
        assert_eq!(router.unresolved().len(), 1);
        assert_eq!(router.unresolved()[0].id, FlowId(1));
    }

    #[test]
    fn leftover_receive_credit_is_fatal() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        router.send("A", "B", vec![0u8; 5]).unwrap();
        assert!(matches!(
            router.on_recv_progress("A", "B", 6, None),
            Err(RouterError::RecvOverflow { surplus: 1, .. })
        ));
        assert!(matches!(
            router.on_recv_progress("B", "A", 1, None),
            Err(RouterError::RecvOverflow { surplus: 1, .. })
        ));
    }

    #[test]
    fn send_accounting() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        let flow = router.send("A", "B", vec![0u8; 100]).unwrap();
        router.apply_notice("A B SEND 60 0").unwrap();
        assert_eq!(flow.bytes_sent(), 60);
        assert!(matches!(
            router.apply_notice("A B SEND 41 0"),
            Err(RouterError::SendOverflow { .. })
        ));
        assert!(matches!(
            router.apply_notice("B A SEND 1 0"),
            Err(RouterError::PairMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn empty_payload_delivers_immediately() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        router.send("A", "B", Vec::<u8>::new()).unwrap();
        let delivery = router.recv("B", RecvMode::NonBlocking).await.unwrap().unwrap();
        assert!(delivery.payload.is_empty());
    }

    #[tokio::test]
    async fn empty_payload_waits_behind_earlier_flow() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        router.send("A", "B", vec![0u8; 3]).unwrap();
        router.send("A", "B", Vec::<u8>::new()).unwrap();
        assert!(router.recv("B", RecvMode::NonBlocking).await.unwrap().is_none());

        let done = router.on_recv_progress("A", "B", 3, None).unwrap();
        assert_eq!(done, vec![FlowId(0), FlowId(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn recv_modes() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        assert!(matches!(
            router.recv("C", RecvMode::NonBlocking).await,
            Err(RouterError::UnknownEndpoint(_))
        ));
        let waited = router
            .recv("B", RecvMode::Timeout(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(waited.is_none());

        let mut waiter = task::spawn(router.recv("B", RecvMode::Blocking));
        assert_pending!(waiter.poll());

        router.send("A", "B", vec![9u8; 2]).unwrap();
        assert_pending!(waiter.poll());
        router.apply_notice("A B RECV 2").unwrap();
        assert!(waiter.is_woken());
        let delivery = assert_ready!(waiter.poll()).unwrap().unwrap();
        assert_eq!(&delivery.payload[..], &[9, 9]);
    }

    #[tokio::test]
    async fn control_station_scenario() {
        let (router, mut endpoints) = compiled(&["A", "B", CONTROL_STATION]);

        router.send("A", CONTROL_STATION, vec![b'a'; 1000]).unwrap();
        router.send("B", CONTROL_STATION, vec![b'b'; 500]).unwrap();
        router.send("A", CONTROL_STATION, vec![b'c'; 200]).unwrap();

        let a = endpoints.get_mut("A").unwrap();
        assert_eq!(a.try_next_directive().unwrap().to_string(), "0 SEND 1000 GCS");
        assert_eq!(a.try_next_directive().unwrap().to_string(), "2 SEND 200 GCS");

        for line in [
            "A GCS SEND 1000 0",
            "B GCS SEND 500 1",
            "A GCS SEND 200 2",
            "B GCS RECV 500 1",
            "A GCS RECV 1100",
            "A GCS RECV 100",
        ] {
            router.apply_notice(line).unwrap();
        }

        let mut order = Vec::new();
        while let Some(d) = router.recv(CONTROL_STATION, RecvMode::NonBlocking).await.unwrap() {
            order.push((d.src, d.flow_id, d.payload.len()));
        }
        assert_eq!(
            order,
            vec![
                ("B".to_string(), FlowId(1), 500),
                ("A".to_string(), FlowId(0), 1000),
                ("A".to_string(), FlowId(2), 200),
            ]
        );
        assert!(router.unresolved().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_fatal_notice() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        let clock = ClockHandle::new(0.01, f64::INFINITY).unwrap();
        let (tx, rx) = mpsc::channel(8);
        router.send("A", "B", vec![0u8; 4]).unwrap();

        tx.send("A B RECV 4".to_string()).await.unwrap();
        tx.send("A B RECV 1".to_string()).await.unwrap();
        let result = router.run(rx, clock, RouterConfig::default()).await;
        assert!(matches!(result, Err(RouterError::RecvOverflow { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn run_ends_when_clock_stops() {
        let (router, _endpoints) = compiled(&["A", "B"]);
        let router = Arc::new(router);
        let clock = ClockHandle::new(0.01, f64::INFINITY).unwrap();
        let (tx, rx) = mpsc::channel::<String>(8);
        router.send("A", "B", vec![0u8; 4]).unwrap();

        let task = {
            let router = Arc::clone(&router);
            let clock = clock.clone();
            tokio::spawn(async move {
                let config = RouterConfig::default().with_io_timeout(Duration::from_millis(10));
                router.run(rx, clock, config).await
            })
        };
        tx.send("A B RECV 2".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        clock.stop();
        task.await.unwrap().unwrap();

        let pending = router.unresolved();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].bytes_received, 2);
        drop(tx);
    }
}
