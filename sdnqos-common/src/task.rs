use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A named activity that runs on a fixed cadence until its shutdown token is cancelled.
///
/// The first tick fires immediately. Ticks that are missed because the runtime was busy are
/// delayed rather than bursted, so a slow cycle never causes back-to-back runs. The interval
/// tick is the only suspension point of the loop.
#[derive(Debug, Clone)]
pub struct Periodic {
    name: &'static str,
    period: Duration,
}

impl Periodic {
    /// Creates a new periodic activity with the given name (used in logs) and period.
    ///
    /// # Panics
    /// Panics if `period` is zero.
    pub fn new(name: &'static str, period: Duration) -> Self {
        assert!(!period.is_zero(), "period for {name} must be non-zero");
        Self { name, period }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the activity on the current Tokio runtime, calling `tick` once per period.
    pub fn spawn<F>(self, shutdown: CancellationToken, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        tokio::spawn(async move {
            let mut interval = time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            debug!(task = self.name, period = ?self.period, "Starting periodic task");

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        debug!(task = self.name, "Shutdown requested, stopping periodic task");
                        break;
                    }
                    _ = interval.tick() => {
                        trace!(task = self.name, "Tick");
                        tick();
                    }
                }
            }
        })
    }
}
