#![doc(issue_tracker_base_url = "https://github.com/sdnqos/sdnqos/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Wire-level types shared between the controller and its collaborators:
//!
//! - [`packet`]: parsing of the raw frames carried by packet-in events.
//! - [`flow`]: typed flow-rule, packet-out and flow-statistics messages exchanged with switches.
//! - [`telemetry`]: the framed codec used to push telemetry events to subscribers.

pub mod flow;
pub mod packet;
pub mod telemetry;
