#![doc(issue_tracker_base_url = "https://github.com/sdnqos/sdnqos/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! The control-plane core: classifies new flows into service classes, installs queue-tagged rule
//! pairs on the switches, and aggregates flow statistics into telemetry.
//!
//! The [`Controller`] consumes [`SwitchEvent`]s from a single ordered channel and talks back to
//! the switches through [`SwitchHandle`]s. The wire protocol spoken with the switches lives
//! outside this crate.

mod aggregator;
pub use aggregator::{FlowTotals, StatsAggregator};

mod channel;
pub use channel::{SwitchEvent, SwitchHandle};

mod classifier;
pub use classifier::{FlowClassifier, TrafficClass};

mod config;
pub use config::{smart_city_switch_names, ClassTable, ControllerOptions, TrafficClassConfig};

mod controller;
pub use controller::{Controller, ControllerHandle};

mod counters;
pub use counters::{Counter, TrafficCounters};

mod default_flow;
pub use default_flow::DefaultFlowManager;

mod error;
pub use error::{ChannelError, ConfigError};

mod installer;
pub use installer::FlowInstaller;

mod poller;
pub use poller::StatsPoller;

mod registry;
pub use registry::SwitchRegistry;

mod reporter;
pub use reporter::TopTalkerReporter;
