#![doc(issue_tracker_base_url = "https://github.com/sdnqos/sdnqos/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use sdnqos_controller::*;
pub use sdnqos_telemetry::*;
pub use sdnqos_wire::{flow, packet};
