use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_util::{codec::Framed, sync::CancellationToken};
use tracing::{debug, error, warn};

use super::{session::SubscriberSession, PubMessage, PubOptions, SocketState};
use sdnqos_wire::telemetry;

/// Accepts subscriber connections and spawns a [`SubscriberSession`] for each of them.
pub(crate) struct PubDriver {
    /// Session ID counter.
    id_counter: u32,
    /// The listener used to accept incoming connections.
    listener: TcpListener,
    /// The publisher options (shared with the socket)
    options: Arc<PubOptions>,
    /// The publisher socket state, shared with the socket front-end.
    state: Arc<SocketState>,
    /// Sender half of the broadcast channel, used to hand out receivers to new sessions. The
    /// sessions end once both this and the socket's sender are dropped.
    to_sessions_bcast: broadcast::Sender<PubMessage>,
    /// Resolves when the socket is dropped.
    shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl PubDriver {
    pub(crate) fn new(
        listener: TcpListener,
        options: Arc<PubOptions>,
        state: Arc<SocketState>,
        to_sessions_bcast: broadcast::Sender<PubMessage>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id_counter: 0,
            listener,
            options,
            state,
            to_sessions_bcast,
            shutdown: Box::pin(async move { shutdown.cancelled().await }),
        }
    }

    fn at_capacity(&self) -> bool {
        self.options
            .max_clients
            .is_some_and(|max| self.state.stats.active_clients() >= max)
    }
}

impl Future for PubDriver {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            if this.shutdown.poll_unpin(cx).is_ready() {
                debug!("Publisher socket dropped, stopping driver");
                return Poll::Ready(());
            }

            // Poll the listener for new incoming connections
            match this.listener.poll_accept(cx) {
                Poll::Ready(Ok((stream, addr))) => {
                    if this.at_capacity() {
                        warn!("Max subscribers reached, rejecting connection from {}", addr);
                        drop(stream);
                        continue;
                    }

                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(err = ?e, "Failed to set TCP_NODELAY for {}", addr);
                    }

                    let session = SubscriberSession::new(
                        this.id_counter,
                        this.to_sessions_bcast.subscribe(),
                        Framed::new(stream, telemetry::Codec::new()),
                        Arc::clone(&this.state),
                        this.options.flush_interval,
                    );

                    tokio::spawn(session);

                    this.state.stats.increment_active_clients();
                    this.id_counter = this.id_counter.wrapping_add(1);

                    debug!("New subscriber connection from {}", addr);

                    continue;
                }
                Poll::Ready(Err(e)) => {
                    // Errors here are usually about `WouldBlock`
                    error!(err = ?e, "Error accepting connection");

                    continue;
                }
                Poll::Pending => {}
            }

            return Poll::Pending;
        }
    }
}
