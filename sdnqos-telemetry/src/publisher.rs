use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::{PubStats, TelemetryEvent};

/// A fire-and-forget sink for telemetry events.
///
/// Implementations must not block and must not fail the caller: delivery problems are logged
/// and the event is dropped.
pub trait TelemetryPublisher: Send + Sync + 'static {
    /// Publishes an event, at most once.
    fn publish(&self, event: TelemetryEvent);
}

impl<P: TelemetryPublisher + ?Sized> TelemetryPublisher for Arc<P> {
    #[inline]
    fn publish(&self, event: TelemetryEvent) {
        (**self).publish(event)
    }
}

/// A publisher that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl TelemetryPublisher for NoopPublisher {
    #[inline]
    fn publish(&self, event: TelemetryEvent) {
        debug!(topic = event.topic(), "Discarding telemetry event");
    }
}

/// An in-process publisher backed by a bounded channel. Useful when the telemetry sink lives in
/// the same process as the controller.
///
/// Events published while the channel is full are dropped.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<TelemetryEvent>,
    stats: Arc<PubStats>,
}

impl ChannelPublisher {
    /// Creates a new publisher with the given buffer size, returning the receiving end.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx, stats: Arc::default() }, rx)
    }

    pub fn stats(&self) -> &PubStats {
        &self.stats
    }
}

impl TelemetryPublisher for ChannelPublisher {
    fn publish(&self, event: TelemetryEvent) {
        match self.tx.try_send(event) {
            Ok(()) => self.stats.increment_published(),
            Err(TrySendError::Full(event)) => {
                warn!(topic = event.topic(), "Telemetry channel full, dropping event");
                self.stats.add_dropped(1);
            }
            Err(TrySendError::Closed(event)) => {
                debug!(topic = event.topic(), "Telemetry receiver closed, dropping event");
                self.stats.add_dropped(1);
            }
        }
    }
}
