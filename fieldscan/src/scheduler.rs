//! The cycle scheduler: the engine's outer loop.
//!
//! One cycle polls every active device concurrently, assembles a single
//! row in catalog order and hands it to the sink. The loop then sleeps
//! whatever remains of the scan interval; an overrunning cycle starts the
//! next one immediately, with no catch-up debt.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use fieldscan_codec::Value;
use fieldscan_config::Config;

use crate::link::Transport;
use crate::planner::{plan_device, DevicePlan};
use crate::poller::poll_device;
use crate::pool::ClientPool;
use crate::writer::RowSink;

/// The polling engine: plans, clients and sink, ready to run cycles.
pub struct Engine<T: Transport, S: RowSink> {
    plans: Vec<DevicePlan>,
    pool: ClientPool<T>,
    sink: S,
    scan_rate: Duration,
    point_count: usize,
}

impl<T: Transport, S: RowSink> Engine<T, S> {
    /// Plan the active fleet and set up one client slot per endpoint.
    pub fn new(config: &Config, transport: T, sink: S) -> Self {
        let plans: Vec<DevicePlan> = config.active_devices().map(plan_device).collect();
        let point_count = plans.iter().map(|p| p.point_count).sum();
        let pool = ClientPool::new(transport, config.active_devices());
        Self {
            plans,
            pool,
            sink,
            scan_rate: config.scan_interval(),
            point_count,
        }
    }

    /// Samples per cycle; equals the column catalog's length.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Run one cycle: fan out over the fleet, gather in catalog order.
    pub async fn scan(&self) -> Vec<Value> {
        let polls = self.plans.iter().map(|plan| poll_device(&self.pool, plan));
        let per_device = futures::future::join_all(polls).await;
        per_device.into_iter().flatten().collect()
    }

    /// Run cycles until `shutdown` flips to `true` (or its sender drops).
    ///
    /// The stop signal interrupts the inter-cycle sleep only; a cycle in
    /// flight is always finished and handed to the sink before the loop
    /// drains and closes every client.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            devices = self.plans.len(),
            points = self.point_count,
            scan_rate_ms = self.scan_rate.as_millis() as u64,
            "scan loop started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            let start = Instant::now();
            let row = self.scan().await;
            if let Err(error) = self.sink.insert(&row).await {
                warn!(%error, "row dropped, retrying next cycle");
            }
            let elapsed = start.elapsed().min(self.scan_rate);
            debug!(elapsed_ms = elapsed.as_millis() as u64, "cycle finished");
            tokio::select! {
                _ = sleep(self.scan_rate - elapsed) => {}
                changed = shutdown.changed() => {
                    // A dropped sender means nobody can ask us to stop
                    // later; treat it as a stop now.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.pool.close_all().await;
        info!("scan loop stopped");
    }
}
