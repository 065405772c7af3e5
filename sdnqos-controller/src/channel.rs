use tokio::sync::mpsc::{self, error::TrySendError};

use crate::ChannelError;
use sdnqos_wire::flow::{DatapathId, FlowMod, FlowStatsEntry, PacketIn, PacketOut, SwitchCommand};

/// The controller's end of a switch connection. Commands are queued on a bounded channel that
/// the connection driver drains and encodes onto the wire.
///
/// Sends never wait: a full queue or a closed connection is reported as a [`ChannelError`].
#[derive(Debug, Clone)]
pub struct SwitchHandle {
    dpid: DatapathId,
    tx: mpsc::Sender<SwitchCommand>,
}

impl SwitchHandle {
    pub fn new(dpid: DatapathId, tx: mpsc::Sender<SwitchCommand>) -> Self {
        Self { dpid, tx }
    }

    /// Creates a handle together with the receiving end of its command queue.
    pub fn channel(dpid: DatapathId, buffer: usize) -> (Self, mpsc::Receiver<SwitchCommand>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(dpid, tx), rx)
    }

    #[inline]
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Returns true if the connection driver has gone away.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn install_flow(&self, flow: FlowMod) -> Result<(), ChannelError> {
        self.send(SwitchCommand::InstallFlow(flow))
    }

    pub fn delete_all_flows(&self) -> Result<(), ChannelError> {
        self.send(SwitchCommand::DeleteAllFlows)
    }

    pub fn request_flow_stats(&self) -> Result<(), ChannelError> {
        self.send(SwitchCommand::RequestFlowStats)
    }

    pub fn packet_out(&self, packet: PacketOut) -> Result<(), ChannelError> {
        self.send(SwitchCommand::PacketOut(packet))
    }

    fn send(&self, command: SwitchCommand) -> Result<(), ChannelError> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full(self.dpid),
            TrySendError::Closed(_) => ChannelError::Closed(self.dpid),
        })
    }
}

/// An event received from the switch side of the control channel.
#[derive(Debug, Clone)]
pub enum SwitchEvent {
    /// A switch completed its handshake.
    Connected(SwitchHandle),
    /// A switch connection was lost.
    Disconnected(DatapathId),
    /// A packet matched no rule but the table-miss rule.
    PacketIn(PacketIn),
    /// Reply to a flow-statistics request.
    FlowStatsReply { dpid: DatapathId, entries: Vec<FlowStatsEntry> },
}

impl SwitchEvent {
    /// The switch this event originates from.
    pub fn dpid(&self) -> DatapathId {
        match self {
            Self::Connected(handle) => handle.dpid(),
            Self::Disconnected(dpid) | Self::FlowStatsReply { dpid, .. } => *dpid,
            Self::PacketIn(packet) => packet.dpid,
        }
    }
}
