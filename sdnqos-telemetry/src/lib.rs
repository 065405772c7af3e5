#![doc(issue_tracker_base_url = "https://github.com/sdnqos/sdnqos/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Telemetry publishing for the controller.
//!
//! Everything here is fire-and-forget: a [`TelemetryPublisher`] never blocks its caller and never
//! reports failures back to it. Events that cannot be delivered are logged and dropped, so the
//! control plane never depends on the observability plane.

use std::io;

use bytes::Bytes;
use thiserror::Error;

mod driver;

mod event;
pub use event::*;

mod publisher;
pub use publisher::*;

mod session;

mod socket;
pub use socket::*;

mod stats;
pub use stats::PubStats;

/// The default per-session buffer size, in events.
const DEFAULT_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("IO error: {0:?}")]
    Io(#[from] io::Error),
    #[error("Wire protocol error: {0:?}")]
    Wire(#[from] sdnqos_wire::telemetry::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Socket closed")]
    SocketClosed,
    #[error("Could not bind to any valid endpoints")]
    NoValidEndpoints,
}

#[derive(Debug, Clone)]
pub struct PubOptions {
    /// The maximum number of concurrent subscribers.
    max_clients: Option<usize>,
    /// The maximum number of outgoing events that can be buffered per session. A session that
    /// falls further behind starts losing events.
    session_buffer_size: usize,
    /// The interval at which each session should be flushed. If this is `None`,
    /// the session will be flushed after every event.
    flush_interval: Option<std::time::Duration>,
}

impl Default for PubOptions {
    fn default() -> Self {
        Self { max_clients: None, session_buffer_size: DEFAULT_BUFFER_SIZE, flush_interval: None }
    }
}

impl PubOptions {
    /// Sets the maximum number of concurrent subscribers.
    pub fn max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = Some(max_clients);
        self
    }

    /// Sets the session buffer size. This is the amount of events that can be buffered
    /// per session before events start being dropped.
    pub fn session_buffer_size(mut self, session_buffer_size: usize) -> Self {
        self.session_buffer_size = session_buffer_size.max(1);
        self
    }

    /// Sets the interval at which each session should be flushed.
    pub fn flush_interval(mut self, flush_interval: std::time::Duration) -> Self {
        self.flush_interval = Some(flush_interval);
        self
    }
}

/// An encoded event on its way to the subscriber sessions.
#[derive(Debug, Clone)]
pub(crate) struct PubMessage {
    topic: &'static str,
    payload: Bytes,
}

impl PubMessage {
    #[inline]
    pub(crate) fn new(topic: &'static str, payload: Bytes) -> Self {
        Self { topic, payload }
    }

    #[inline]
    pub(crate) fn topic(&self) -> &'static str {
        self.topic
    }

    #[inline]
    pub(crate) fn into_wire(
        self,
        seq: u32,
    ) -> Result<sdnqos_wire::telemetry::Message, sdnqos_wire::telemetry::Error> {
        sdnqos_wire::telemetry::Message::new(seq, Bytes::from_static(self.topic.as_bytes()), self.payload)
    }
}

/// The publisher socket state, shared between the driver task, the sessions and the socket.
#[derive(Debug, Default)]
pub(crate) struct SocketState {
    pub(crate) stats: PubStats,
}
