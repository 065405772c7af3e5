use std::{net::Ipv4Addr, time::Duration};

use rustc_hash::FxHashMap;
use tokio::time::Instant;

use sdnqos_telemetry::TopTalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    /// Cumulative packets since the source was first seen or last evicted.
    pub packets: u64,
    /// When traffic was last recorded for this source.
    pub last_seen: Instant,
}

/// Per-source cumulative packet counters.
///
/// Counts only grow. Sources that go quiet are evicted by
/// [`evict_inactive`](Self::evict_inactive), so the map only holds recently active sources.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    counters: FxHashMap<Ipv4Addr, Counter>,
}

impl TrafficCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `packets` to the source's running total and marks the source as seen at `now`.
    /// Zero additions are ignored and neither create nor refresh an entry.
    pub fn record(&mut self, src: Ipv4Addr, packets: u64, now: Instant) {
        if packets == 0 {
            return;
        }

        let counter = self.counters.entry(src).or_insert(Counter { packets: 0, last_seen: now });
        counter.packets = counter.packets.saturating_add(packets);
        counter.last_seen = now;
    }

    #[inline]
    pub fn get(&self, src: Ipv4Addr) -> Option<Counter> {
        self.counters.get(&src).copied()
    }

    /// The current packet count of a source, zero if unknown.
    #[inline]
    pub fn packets(&self, src: Ipv4Addr) -> u64 {
        self.counters.get(&src).map_or(0, |c| c.packets)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// The `n` sources with the highest counts, descending. Ties are ordered by the textual form
    /// of the address.
    pub fn top(&self, n: usize) -> Vec<TopTalker> {
        let mut ranked: Vec<_> = self
            .counters
            .iter()
            .map(|(addr, c)| (addr.to_string(), TopTalker(*addr, c.packets)))
            .collect();

        ranked.sort_unstable_by(|(a_str, a), (b_str, b)| b.1.cmp(&a.1).then_with(|| a_str.cmp(b_str)));
        ranked.truncate(n);

        ranked.into_iter().map(|(_, talker)| talker).collect()
    }

    /// Removes every source not seen for longer than `threshold`, resetting its count to zero.
    /// Returns the number of sources evicted.
    pub fn evict_inactive(&mut self, now: Instant, threshold: Duration) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| now.saturating_duration_since(c.last_seen) <= threshold);
        before - self.counters.len()
    }
}
