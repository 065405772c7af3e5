use tracing::{debug, info};

use crate::{ChannelError, SwitchHandle};
use sdnqos_wire::flow::FlowMod;

/// Resets a freshly connected switch to a known state: an empty table plus the table-miss
/// rule that sends every unmatched packet to the controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFlowManager;

impl DefaultFlowManager {
    /// Queues the delete-all and the table-miss install, in that order. Deleting from an empty
    /// table is a no-op on the switch. Both are attempted, the first error is returned.
    pub fn on_switch_connected(&self, switch: &SwitchHandle) -> Result<(), ChannelError> {
        let cleared = switch.delete_all_flows();
        if cleared.is_ok() {
            debug!(dpid = switch.dpid(), "Cleared flow table");
        }

        let installed = switch.install_flow(FlowMod::table_miss());
        if installed.is_ok() {
            info!(dpid = switch.dpid(), "Installed table-miss rule");
        }

        cleared.and(installed)
    }
}
