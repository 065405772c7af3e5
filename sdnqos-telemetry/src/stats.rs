use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Statistics for a telemetry publisher. These are shared between the driver task, the
/// subscriber sessions and the socket.
#[derive(Debug, Default)]
pub struct PubStats {
    /// Total bytes sent to subscribers
    bytes_tx: AtomicUsize,
    /// Number of connected subscribers
    active_clients: AtomicUsize,
    /// Events accepted for publishing
    published: AtomicU64,
    /// Events dropped, either before reaching the sessions or by lagging sessions
    dropped: AtomicU64,
}

impl PubStats {
    #[inline]
    pub(crate) fn increment_tx(&self, bytes: usize) {
        self.bytes_tx.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_active_clients(&self) {
        self.active_clients.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn decrement_active_clients(&self) {
        self.active_clients.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn bytes_tx(&self) -> usize {
        self.bytes_tx.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn active_clients(&self) -> usize {
        self.active_clients.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
