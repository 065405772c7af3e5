use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::TrafficCounters;
use sdnqos_common::Periodic;
use sdnqos_telemetry::{TelemetryEvent, TelemetryPublisher, TopTalkers};

/// Periodically ranks the per-source counters, publishes the ranking and evicts sources that
/// went quiet.
#[derive(Debug)]
pub struct TopTalkerReporter<P> {
    counters: Arc<Mutex<TrafficCounters>>,
    publisher: P,
    top_n: usize,
    inactivity_timeout: Duration,
}

impl<P: TelemetryPublisher> TopTalkerReporter<P> {
    pub fn new(
        counters: Arc<Mutex<TrafficCounters>>,
        publisher: P,
        top_n: usize,
        inactivity_timeout: Duration,
    ) -> Self {
        Self { counters, publisher, top_n, inactivity_timeout }
    }

    /// Runs one reporting cycle. The ranking is taken before the eviction pass, so a source that
    /// is evicted in this cycle still appears in this cycle's report.
    pub fn report_once(&self, now: Instant) -> TopTalkers {
        let (top, evicted, tracked) = {
            let mut counters = self.counters.lock();
            let top = counters.top(self.top_n);
            let evicted = counters.evict_inactive(now, self.inactivity_timeout);
            (top, evicted, counters.len())
        };

        debug!(ranked = top.len(), evicted, tracked, "Reporting top talkers");

        let report = TopTalkers { top };
        self.publisher.publish(TelemetryEvent::TopTalkers(report.clone()));
        report
    }

    /// Runs [`report_once`](Self::report_once) every `interval` until `shutdown` is cancelled.
    pub fn spawn(self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        Periodic::new("top-talker-reporter", interval).spawn(shutdown, move || {
            self.report_once(Instant::now());
        })
    }
}
