use std::{
    borrow::Cow,
    collections::HashSet,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::broadcast, time::Interval};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_util::codec::Framed;
use tracing::{debug, error, trace, warn};

use super::{PubMessage, SocketState};
use sdnqos_wire::telemetry::{self, SUB_PREFIX, UNSUB_PREFIX};

/// A subscriber session. Represents a single connection to a telemetry subscriber and is
/// responsible for its topic subscriptions and for writing matching events to it.
pub(super) struct SubscriberSession {
    /// The sequence number of the next outgoing frame.
    seq: u32,
    /// The ID of this session.
    session_id: u32,
    /// Events from the socket.
    from_socket_bcast: BroadcastStream<PubMessage>,
    /// Frame queued to be sent on the connection.
    pending_egress: Option<telemetry::Message>,
    /// The socket state.
    state: Arc<SocketState>,
    /// The framed connection.
    conn: Framed<TcpStream, telemetry::Codec>,
    /// The subscribed topics.
    topic_filter: HashSet<String>,
    /// Flush timer. If `None`, the connection is flushed as soon as there is buffered data.
    flush_interval: Option<Interval>,
}

impl SubscriberSession {
    pub(super) fn new(
        session_id: u32,
        from_socket_bcast: broadcast::Receiver<PubMessage>,
        conn: Framed<TcpStream, telemetry::Codec>,
        state: Arc<SocketState>,
        flush_interval: Option<Duration>,
    ) -> Self {
        Self {
            seq: 0,
            session_id,
            from_socket_bcast: BroadcastStream::new(from_socket_bcast),
            pending_egress: None,
            state,
            conn,
            topic_filter: HashSet::new(),
            flush_interval: flush_interval.map(tokio::time::interval),
        }
    }

    /// Handles outgoing events to the subscriber.
    #[inline]
    fn on_outgoing(&mut self, msg: PubMessage) {
        if !self.topic_filter.contains(msg.topic()) {
            trace!(topic = msg.topic(), "Event does not match topic filter, discarding");
            return;
        }

        match msg.into_wire(self.seq) {
            Ok(frame) => {
                self.pending_egress = Some(frame);
                self.seq = self.seq.wrapping_add(1);
            }
            Err(e) => error!(err = ?e, session_id = self.session_id, "Failed to frame event"),
        }
    }

    /// Handles incoming frames from the subscriber. Returns `false` if the session should close.
    #[inline]
    fn on_incoming(&mut self, msg: &telemetry::Message) -> bool {
        // The only incoming frames we should see are control frames.
        match msg_to_control(msg) {
            ControlMsg::Subscribe(topic) => {
                debug!(session_id = self.session_id, "Subscribing to topic {}", topic);
                self.topic_filter.insert(topic.into_owned());
                true
            }
            ControlMsg::Unsubscribe(topic) => {
                debug!(session_id = self.session_id, "Unsubscribing from topic {}", topic);
                self.topic_filter.remove(topic.as_ref());
                true
            }
            ControlMsg::Close => {
                debug!("Closing session {} after receiving close message", self.session_id);
                false
            }
        }
    }
}

impl Drop for SubscriberSession {
    fn drop(&mut self) {
        self.state.stats.decrement_active_clients();
    }
}

enum ControlMsg<'a> {
    /// Subscribe to a topic.
    Subscribe(Cow<'a, str>),
    /// Unsubscribe from a topic.
    Unsubscribe(Cow<'a, str>),
    /// Close the session.
    Close,
}

/// Converts the frame to a control message. Anything that is not a subscription toggle closes
/// the session.
#[inline]
fn msg_to_control(msg: &telemetry::Message) -> ControlMsg<'_> {
    if !msg.is_control() {
        warn!("Unexpected data frame from subscriber, closing session");
        return ControlMsg::Close;
    }

    if let Some(topic) = msg.topic().strip_prefix(SUB_PREFIX) {
        ControlMsg::Subscribe(String::from_utf8_lossy(topic))
    } else if let Some(topic) = msg.topic().strip_prefix(UNSUB_PREFIX) {
        ControlMsg::Unsubscribe(String::from_utf8_lossy(topic))
    } else {
        ControlMsg::Close
    }
}

impl Future for SubscriberSession {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            // Write the queued frame into the `Framed` buffer. Flushing happens further down.
            if let Some(msg) = this.pending_egress.take() {
                let msg_len = msg.size();

                match this.conn.start_send_unpin(msg) {
                    Ok(_) => {
                        this.state.stats.increment_tx(msg_len);
                    }
                    Err(e) => {
                        error!(err = ?e, session_id = this.session_id, "Failed to send event");
                        let _ = this.conn.poll_close_unpin(cx);
                        return Poll::Ready(());
                    }
                }
            }

            // Poll outgoing events
            if let Poll::Ready(item) = this.from_socket_bcast.poll_next_unpin(cx) {
                match item {
                    Some(Ok(msg)) => {
                        this.on_outgoing(msg);
                        continue;
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                        warn!(session_id = this.session_id, missed = n, "Subscriber lagging behind");
                        this.state.stats.add_dropped(n);
                        continue;
                    }
                    None => {
                        debug!("Socket closed, shutting down session {}", this.session_id);
                        let _ = this.conn.poll_close_unpin(cx);
                        return Poll::Ready(());
                    }
                }
            }

            if !this.conn.write_buffer().is_empty() {
                let should_flush = match this.flush_interval {
                    Some(ref mut interval) => interval.poll_tick(cx).is_ready(),
                    None => true,
                };

                if should_flush {
                    if let Poll::Ready(Err(e)) = this.conn.poll_flush_unpin(cx) {
                        error!(err = ?e, session_id = this.session_id, "Failed to flush connection, shutting down session");
                        let _ = this.conn.poll_close_unpin(cx);
                        return Poll::Ready(());
                    }
                }
            }

            // Handle incoming control frames
            if let Poll::Ready(item) = this.conn.poll_next_unpin(cx) {
                match item {
                    Some(Ok(msg)) => {
                        if this.on_incoming(&msg) {
                            continue;
                        }

                        let _ = this.conn.poll_close_unpin(cx);
                        return Poll::Ready(());
                    }
                    Some(Err(e)) => {
                        error!(err = ?e, session_id = this.session_id, "Error reading from subscriber");
                        let _ = this.conn.poll_close_unpin(cx);
                        return Poll::Ready(());
                    }
                    None => {
                        debug!("Subscriber disconnected, shutting down session {}", this.session_id);
                        return Poll::Ready(());
                    }
                }
            }

            return Poll::Pending;
        }
    }
}
