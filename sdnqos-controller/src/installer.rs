use std::net::Ipv4Addr;

use tracing::debug;

use crate::{ChannelError, SwitchHandle, TrafficClass};
use sdnqos_wire::flow::{FlowMatch, FlowMod, PacketIn};

/// Installs per-conversation rules for classified traffic and forwards the packets that
/// triggered them.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowInstaller;

impl FlowInstaller {
    /// Builds the forward (`src -> dst`) and reverse (`dst -> src`) rules for a class. Both carry
    /// the class's priority, actions and timeouts.
    pub fn rule_pair(&self, class: &TrafficClass, src: Ipv4Addr, dst: Ipv4Addr) -> (FlowMod, FlowMod) {
        let forward = FlowMod {
            priority: class.priority(),
            flow_match: FlowMatch::ipv4(src, dst),
            actions: class.actions(),
            idle_timeout: class.idle_timeout(),
            hard_timeout: class.hard_timeout(),
        };
        let reverse = forward.reversed();

        (forward, reverse)
    }

    /// Sends both rules of the pair. The installs are independent: a failure of the first does
    /// not prevent the second. Returns the first error, if any.
    pub fn install(
        &self,
        switch: &SwitchHandle,
        class: &TrafficClass,
        src: Ipv4Addr,
        dst: Ipv4Addr,
    ) -> Result<(), ChannelError> {
        let (forward, reverse) = self.rule_pair(class, src, dst);
        let mut result = Ok(());

        for rule in [forward, reverse] {
            let flow_match = rule.flow_match;
            match switch.install_flow(rule) {
                Ok(()) => debug!(dpid = switch.dpid(), class = class.name(), %flow_match, "Queued flow install"),
                Err(e) if result.is_ok() => result = Err(e),
                Err(_) => {}
            }
        }

        result
    }

    /// Floods the packet to every port except the one it arrived on.
    pub fn flood(&self, switch: &SwitchHandle, packet: &PacketIn) -> Result<(), ChannelError> {
        switch.packet_out(packet.flood())
    }
}
