use std::net::Ipv4Addr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Topic of per-switch flow statistics snapshots.
pub const FLOW_STATS_TOPIC: &str = "flow_stats";
/// Topic of top-talker rankings.
pub const TOP_TALKERS_TOPIC: &str = "top_talkers";
/// Topic of freeform alerts.
pub const ALERT_TOPIC: &str = "alert";

/// Aggregated flow statistics of one switch for one polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStatsSnapshot {
    pub switch_id: u64,
    pub name: String,
    pub flow_count: usize,
    pub bandwidth_mbps: f64,
    pub packet_count: u64,
}

/// A source address together with its cumulative packet count.
/// Serialized as a `[address, count]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTalker(pub Ipv4Addr, pub u64);

impl TopTalker {
    #[inline]
    pub fn address(&self) -> Ipv4Addr {
        self.0
    }

    #[inline]
    pub fn packets(&self) -> u64 {
        self.1
    }
}

/// Ranked sources, highest packet count first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTalkers {
    pub top: Vec<TopTalker>,
}

/// An event pushed to the telemetry sink.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    FlowStats(FlowStatsSnapshot),
    TopTalkers(TopTalkers),
    /// Freeform payload, forwarded as-is.
    Alert(serde_json::Value),
}

impl TelemetryEvent {
    /// The topic this event is published under.
    #[inline]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::FlowStats(_) => FLOW_STATS_TOPIC,
            Self::TopTalkers(_) => TOP_TALKERS_TOPIC,
            Self::Alert(_) => ALERT_TOPIC,
        }
    }

    /// Serializes the event body to JSON.
    pub fn to_payload(&self) -> Result<Bytes, serde_json::Error> {
        let body = match self {
            Self::FlowStats(snapshot) => serde_json::to_vec(snapshot)?,
            Self::TopTalkers(top) => serde_json::to_vec(top)?,
            Self::Alert(payload) => serde_json::to_vec(payload)?,
        };

        Ok(Bytes::from(body))
    }

    /// Parses an event body received under `topic`. Returns `Ok(None)` for unknown topics.
    pub fn from_payload(topic: &str, payload: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        let event = match topic {
            FLOW_STATS_TOPIC => Self::FlowStats(serde_json::from_slice(payload)?),
            TOP_TALKERS_TOPIC => Self::TopTalkers(serde_json::from_slice(payload)?),
            ALERT_TOPIC => Self::Alert(serde_json::from_slice(payload)?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}
