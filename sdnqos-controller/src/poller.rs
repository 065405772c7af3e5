use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::SwitchRegistry;
use sdnqos_common::Periodic;

/// Periodically asks every registered switch for its flow statistics. Replies arrive
/// asynchronously as switch events.
#[derive(Debug, Clone)]
pub struct StatsPoller {
    registry: Arc<RwLock<SwitchRegistry>>,
}

impl StatsPoller {
    pub fn new(registry: Arc<RwLock<SwitchRegistry>>) -> Self {
        Self { registry }
    }

    /// Sends one request to each registered switch. Returns the number of requests queued;
    /// a failed send is logged and the remaining switches are still polled.
    pub fn poll_once(&self) -> usize {
        // Don't hold the lock while sending.
        let switches = self.registry.read().handles();

        let mut sent = 0;
        for switch in &switches {
            match switch.request_flow_stats() {
                Ok(()) => sent += 1,
                Err(e) => warn!(dpid = switch.dpid(), err = ?e, "Failed to request flow stats"),
            }
        }

        debug!(sent, registered = switches.len(), "Polled flow stats");
        sent
    }

    /// Runs [`poll_once`](Self::poll_once) every `interval` until `shutdown` is cancelled.
    pub fn spawn(self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        Periodic::new("stats-poller", interval).spawn(shutdown, move || {
            self.poll_once();
        })
    }
}
