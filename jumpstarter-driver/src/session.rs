//  SESSION.rs
//
//  Description:
//!   Owns a driver tree and a resource registry, and is the thing that
//!   gets shut down when the exporter's listener closes (§3 "Session",
//!   §4.5). Grounded on `brane-drv/src/handler.rs`'s `DriverHandler`
//!   (session map, logging-on-error idiom) and `brane-drv/src/main.rs`'s
//!   service-binary wiring, generalised from a map of one VM per
//!   BraneScript app to a single driver tree per listener — jumpstarter
//!   sessions are single-tenant, so the donor's `DashMap<AppId, Vm>`
//!   collapses to one [`Session`] instead of a map. That is a
//!   deliberate simplification of the donor's shape, not a dropped
//!   feature: §3 describes exactly one driver tree per session.
//

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use jumpstarter_proto::driver::{DriverCallReply, DriverReport, LogEntry, LogLevel};
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::value::Value;
use log::{debug, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dispatch;
use crate::driver::ValueStream;
use crate::registry::ResourceRegistry;
use crate::tree::{DriverTree, TreeNode};

/// Depth of the per-subscriber `LogStream` broadcast queue. A subscriber
/// that falls more than this many entries behind gets a gap marker
/// instead of the dropped entries (§4.5 method 5, §9 Open Questions).
const LOG_QUEUE_DEPTH: usize = 256;

/// Owns the driver tree served by one exporter listener (§3).
pub struct Session {
    tree: DriverTree,
    registry: ResourceRegistry,
    call_id: AtomicU64,
    shutting_down: AtomicBool,
    log_tx: broadcast::Sender<LogEntry>,
}
impl Session {
    pub fn new(root: TreeNode) -> Arc<Self> {
        let (log_tx, _) = broadcast::channel(LOG_QUEUE_DEPTH);
        Arc::new(Self { tree: DriverTree::new(root), registry: ResourceRegistry::new(), call_id: AtomicU64::new(0), shutting_down: AtomicBool::new(false), log_tx })
    }

    /// Allocates the next call-id, used only for log correlation (§3).
    pub fn next_call_id(&self) -> u64 { self.call_id.fetch_add(1, Ordering::Relaxed) }

    pub fn is_shutting_down(&self) -> bool { self.shutting_down.load(Ordering::Acquire) }

    pub fn tree(&self) -> &DriverTree { &self.tree }

    pub fn registry(&self) -> &ResourceRegistry { &self.registry }

    /// Appends a log record and fans it out to every `LogStream`
    /// subscriber. Never blocks: `broadcast::Sender::send` is
    /// non-blocking and simply lags slow receivers instead.
    pub fn log(&self, level: LogLevel, logger: impl Into<String>, message: impl Into<String>) {
        let entry = LogEntry {
            ts: std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0),
            level: level as i32,
            logger: logger.into(),
            source: None,
            message: message.into(),
        };
        // No subscribers is not an error; it just means nobody's watching.
        let _ = self.log_tx.send(entry);
    }

    /// Subscribes to this session's log fan-out (§4.5 method 5).
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> { self.log_tx.subscribe() }

    /// `DriverCall` (§4.3), guarded by the session's shutdown flag (§5:
    /// "no call is served before `serve()` or after `stop()`").
    pub async fn driver_call(&self, uuid: Uuid, method: &str, args: Value) -> Result<DriverCallReply, ErrorKind> {
        if self.is_shutting_down() {
            return Err(ErrorKind::Cancelled("session is shutting down".into()));
        }
        let call_id = self.next_call_id();
        debug!("[call {call_id}] DriverCall({uuid}, {method})");
        let value = dispatch::driver_call(&self.tree, uuid, method, args, &self.registry).await?;
        Ok(DriverCallReply { value })
    }

    /// `StreamingDriverCall` (§4.3).
    pub async fn streaming_driver_call(&self, uuid: Uuid, method: &str, args: Value) -> Result<ValueStream, ErrorKind> {
        if self.is_shutting_down() {
            return Err(ErrorKind::Cancelled("session is shutting down".into()));
        }
        dispatch::streaming_driver_call(&self.tree, uuid, method, args).await
    }

    /// `GetReport` (§4.2, §4.5 method 1).
    pub fn report(&self) -> DriverReport { self.tree.enumerate() }

    /// Runs each driver's teardown hook in reverse enumeration order,
    /// then marks the session as no longer accepting calls (§4.5: "on
    /// stop it closes the listener, then cancels all in-flight calls and
    /// streams, then invokes each driver's teardown hook in reverse
    /// enumeration order").
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        let mut report = self.tree.enumerate().entries;
        report.reverse();
        // Proxy nodes resolve to their target's driver; skip torn-down
        // targets to avoid invoking `teardown()` twice for one driver.
        let mut torn_down = std::collections::HashSet::new();
        for entry in report {
            let Ok(uuid) = entry.uuid.parse::<Uuid>() else { continue };
            match self.tree.resolve(uuid) {
                Ok(driver) => {
                    if torn_down.insert(Arc::as_ptr(&driver) as *const ()) {
                        driver.teardown().await;
                    }
                },
                Err(_) => warn!("could not resolve driver '{uuid}' during shutdown teardown"),
            }
        }
    }
}
