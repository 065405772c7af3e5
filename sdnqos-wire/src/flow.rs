use std::{fmt, net::Ipv4Addr};

use bytes::Bytes;

use crate::packet::ETH_TYPE_IPV4;

/// Opaque switch (datapath) identifier.
pub type DatapathId = u64;

/// Timeout value meaning "never expire".
pub const NO_TIMEOUT: u16 = 0;

/// The lowest rule priority. Used by the catch-all rule.
pub const LOWEST_PRIORITY: u16 = 0;

/// Where the output action of a rule sends matching packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPort {
    /// A physical port on the switch.
    Physical(u32),
    /// Process with the switch's normal (non-OpenFlow) pipeline.
    Normal,
    /// All physical ports except the ingress port.
    Flood,
    /// Send to the controller. `max_len` is the number of payload bytes to include, `None` means
    /// the full packet without buffering it on the switch.
    Controller { max_len: Option<u16> },
}

/// A single rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Enqueue on the given QoS queue of the output port.
    SetQueue(u32),
    /// Output on the given port.
    Output(OutputPort),
}

/// The match part of a flow rule. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlowMatch {
    pub eth_type: Option<u16>,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
}

impl FlowMatch {
    /// A match that matches every packet.
    #[inline]
    pub const fn match_all() -> Self {
        Self { eth_type: None, ipv4_src: None, ipv4_dst: None }
    }

    /// Matches IPv4 traffic from `src` to `dst`.
    #[inline]
    pub const fn ipv4(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self { eth_type: Some(ETH_TYPE_IPV4), ipv4_src: Some(src), ipv4_dst: Some(dst) }
    }

    /// Returns the same match with source and destination swapped.
    #[inline]
    pub const fn reversed(&self) -> Self {
        Self { eth_type: self.eth_type, ipv4_src: self.ipv4_dst, ipv4_dst: self.ipv4_src }
    }

    #[inline]
    pub const fn is_match_all(&self) -> bool {
        self.eth_type.is_none() && self.ipv4_src.is_none() && self.ipv4_dst.is_none()
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_match_all() {
            return write!(f, "*");
        }

        let src = self.ipv4_src.map_or_else(|| "*".to_string(), |ip| ip.to_string());
        let dst = self.ipv4_dst.map_or_else(|| "*".to_string(), |ip| ip.to_string());
        write!(f, "{src} -> {dst}")
    }
}

/// A flow-rule installation ("flow mod add").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub priority: u16,
    pub flow_match: FlowMatch,
    pub actions: Vec<Action>,
    /// Seconds without matching traffic before the rule expires. [`NO_TIMEOUT`] disables it.
    pub idle_timeout: u16,
    /// Seconds before the rule expires unconditionally. [`NO_TIMEOUT`] disables it.
    pub hard_timeout: u16,
}

impl FlowMod {
    /// The table-miss rule: lowest priority, match everything, send the whole packet to the
    /// controller, never expire.
    pub fn table_miss() -> Self {
        Self {
            priority: LOWEST_PRIORITY,
            flow_match: FlowMatch::match_all(),
            actions: vec![Action::Output(OutputPort::Controller { max_len: None })],
            idle_timeout: NO_TIMEOUT,
            hard_timeout: NO_TIMEOUT,
        }
    }

    /// Returns the same rule matching the reverse direction.
    pub fn reversed(&self) -> Self {
        Self { flow_match: self.flow_match.reversed(), ..self.clone() }
    }
}

/// Reference to a packet buffered on the switch. `None` means the switch did not buffer the
/// packet and the full payload travels with the packet-in.
pub type BufferId = Option<u32>;

/// Instructs the switch to emit a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: BufferId,
    pub in_port: u32,
    pub actions: Vec<Action>,
    /// The packet bytes. Only set when the switch did not buffer the packet.
    pub data: Option<Bytes>,
}

impl PacketOut {
    /// Floods a packet that arrived on `in_port` to all other ports.
    pub fn flood(buffer_id: BufferId, in_port: u32, data: Bytes) -> Self {
        Self {
            buffer_id,
            in_port,
            actions: vec![Action::Output(OutputPort::Flood)],
            data: buffer_id.is_none().then_some(data),
        }
    }
}

/// A packet that matched only the table-miss rule and was sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub dpid: DatapathId,
    pub in_port: u32,
    pub buffer_id: BufferId,
    /// The raw frame.
    pub data: Bytes,
}

impl PacketIn {
    /// A packet-out that floods this packet to every port except the one it arrived on.
    #[inline]
    pub fn flood(&self) -> PacketOut {
        PacketOut::flood(self.buffer_id, self.in_port, self.data.clone())
    }
}

/// One entry of a flow-statistics reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowStatsEntry {
    pub priority: u16,
    pub flow_match: FlowMatch,
    pub packet_count: u64,
    pub byte_count: u64,
}

impl FlowStatsEntry {
    /// The source address of the traffic counted by this entry, if the rule matches on one.
    #[inline]
    pub fn source(&self) -> Option<Ipv4Addr> {
        self.flow_match.ipv4_src
    }
}

/// A command sent from the controller to a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCommand {
    /// Delete every rule in the switch's table.
    DeleteAllFlows,
    /// Install a flow rule.
    InstallFlow(FlowMod),
    /// Request statistics for all installed flows.
    RequestFlowStats,
    /// Emit a packet.
    PacketOut(PacketOut),
}
