use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::TrafficCounters;
use sdnqos_common::{constants::MiB, secs_f64_nonzero};
use sdnqos_telemetry::FlowStatsSnapshot;
use sdnqos_wire::flow::{DatapathId, FlowStatsEntry};

/// Sums of one statistics reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowTotals {
    pub flow_count: usize,
    pub byte_count: u64,
    pub packet_count: u64,
}

/// Turns flow-statistics replies into per-switch snapshots and per-source packet counts.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    poll_interval: Duration,
}

impl StatsAggregator {
    /// Creates an aggregator for replies requested every `poll_interval`. The interval is the
    /// window bandwidth is computed over.
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn totals(entries: &[FlowStatsEntry]) -> FlowTotals {
        entries.iter().fold(
            FlowTotals { flow_count: entries.len(), ..Default::default() },
            |mut totals, entry| {
                totals.byte_count = totals.byte_count.saturating_add(entry.byte_count);
                totals.packet_count = totals.packet_count.saturating_add(entry.packet_count);
                totals
            },
        )
    }

    /// Megabits (2^20 bits) per second over one polling window, rounded to two decimals.
    pub fn bandwidth_mbps(&self, byte_count: u64) -> f64 {
        let megabits = (byte_count as f64 * 8.0) / f64::from(MiB);
        let mbps = megabits / secs_f64_nonzero(self.poll_interval);
        (mbps * 100.0).round() / 100.0
    }

    /// Processes one reply: accumulates the packet count of every entry that matches on a
    /// source address and returns the switch snapshot. Entries without a source still count
    /// towards the totals.
    ///
    /// Counts are added as reported. Flow counters on the switch are cumulative, so a long-lived
    /// flow contributes its running total on every poll.
    pub fn on_reply(
        &self,
        dpid: DatapathId,
        name: String,
        entries: &[FlowStatsEntry],
        counters: &mut TrafficCounters,
        now: Instant,
    ) -> FlowStatsSnapshot {
        for entry in entries {
            if let Some(src) = entry.source() {
                counters.record(src, entry.packet_count, now);
            }
        }

        let totals = Self::totals(entries);
        let bandwidth_mbps = self.bandwidth_mbps(totals.byte_count);

        trace!(dpid, flows = totals.flow_count, bytes = totals.byte_count, bandwidth_mbps, "Aggregated flow stats");

        FlowStatsSnapshot {
            switch_id: dpid,
            name,
            flow_count: totals.flow_count,
            bandwidth_mbps,
            packet_count: totals.packet_count,
        }
    }
}
