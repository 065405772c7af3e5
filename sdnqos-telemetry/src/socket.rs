use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use tokio::{
    net::{lookup_host, TcpListener, ToSocketAddrs},
    sync::broadcast,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{
    driver::PubDriver, PubMessage, PubOptions, PubStats, SocketState, TelemetryError,
    TelemetryEvent, TelemetryPublisher,
};

/// A telemetry publisher socket. Subscribers (dashboards) connect over TCP and subscribe to
/// topics; every published event is fanned out to the sessions subscribed to its topic.
///
/// ## Session
/// Per subscriber, the socket maintains a session. The session manages the underlying
/// connection and its topic subscriptions, and holds a bounded queue of events to be
/// transmitted. A session that cannot keep up loses the oldest events.
#[derive(Debug)]
pub struct PubSocket {
    /// The socket options, shared with the driver.
    options: Arc<PubOptions>,
    /// The socket state, shared with the driver and the sessions.
    state: Arc<SocketState>,
    /// The broadcast channel to all active sessions.
    to_sessions_bcast: Option<broadcast::Sender<PubMessage>>,
    /// Cancels the driver task when the socket is dropped.
    shutdown: CancellationToken,
    /// The local address this socket is bound to.
    local_addr: Option<SocketAddr>,
}

impl Default for PubSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSocket {
    /// Creates a new publisher socket with the default [`PubOptions`].
    pub fn new() -> Self {
        Self::with_options(PubOptions::default())
    }

    /// Creates a new publisher socket with the given options.
    pub fn with_options(options: PubOptions) -> Self {
        Self {
            options: Arc::new(options),
            state: Arc::default(),
            to_sessions_bcast: None,
            shutdown: CancellationToken::new(),
            local_addr: None,
        }
    }

    /// Binds the socket to the first of the resolved addresses that accepts the bind, and
    /// spawns the driver task.
    pub async fn bind(&mut self, addr: impl ToSocketAddrs) -> Result<(), TelemetryError> {
        let mut listener = None;

        for addr in lookup_host(addr).await? {
            match TcpListener::bind(addr).await {
                Ok(l) => {
                    listener = Some(l);
                    break;
                }
                Err(e) => {
                    warn!(err = ?e, "Failed to bind to {}, trying next address", addr);
                }
            }
        }

        let listener = listener.ok_or(TelemetryError::NoValidEndpoints)?;
        let local_addr = listener.local_addr()?;

        debug!("Telemetry publisher listening on {}", local_addr);

        let (to_sessions_bcast, _) = broadcast::channel(self.options.session_buffer_size);

        let driver = PubDriver::new(
            listener,
            Arc::clone(&self.options),
            Arc::clone(&self.state),
            to_sessions_bcast.clone(),
            self.shutdown.clone(),
        );

        tokio::spawn(driver);

        self.local_addr = Some(local_addr);
        self.to_sessions_bcast = Some(to_sessions_bcast);

        Ok(())
    }

    /// Publishes a raw payload under `topic`.
    pub fn try_publish(&self, topic: &'static str, payload: Bytes) -> Result<(), TelemetryError> {
        let tx = self.to_sessions_bcast.as_ref().ok_or(TelemetryError::SocketClosed)?;

        trace!(topic, len = payload.len(), "Publishing");
        self.state.stats.increment_published();

        // Broadcast the message directly to all active sessions. Sending fails when no session
        // currently holds a receiver.
        if tx.send(PubMessage::new(topic, payload)).is_err() {
            debug!("No active subscriber sessions");
        }

        Ok(())
    }

    /// Encodes and publishes a telemetry event.
    pub fn try_publish_event(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let payload = event.to_payload()?;
        self.try_publish(event.topic(), payload)
    }

    pub fn stats(&self) -> &PubStats {
        &self.state.stats
    }

    /// Returns the local address this socket is bound to. `None` if the socket is not bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl TelemetryPublisher for PubSocket {
    fn publish(&self, event: TelemetryEvent) {
        if let Err(e) = self.try_publish_event(&event) {
            warn!(err = ?e, topic = event.topic(), "Failed to publish telemetry event, dropping");
            self.state.stats.add_dropped(1);
        }
    }
}

impl Drop for PubSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
