use std::{fs::File, path::Path, time::Duration};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ConfigError;
use sdnqos_wire::flow::DatapathId;

/// The default statistics polling interval.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// The default top-talker reporting interval.
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);
/// The default number of ranked sources per report.
const DEFAULT_TOP_N: usize = 3;
/// Sources not seen for longer than this are evicted by the reporter.
const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// One row of the classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficClassConfig {
    pub name: String,
    /// IPv4 ranges in CIDR notation. A bare address is treated as a /32. Entries that don't
    /// parse are logged and never match.
    #[serde(default)]
    pub ranges: Vec<String>,
    pub priority: u16,
    /// The QoS queue flows of this class are enqueued on. `None` leaves queue selection to the
    /// switch.
    #[serde(default)]
    pub queue: Option<u32>,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
}

impl TrafficClassConfig {
    fn priority_class(name: &str, range: &str, priority: u16, queue: u32) -> Self {
        Self {
            name: name.to_string(),
            ranges: vec![range.to_string()],
            priority,
            queue: Some(queue),
            idle_timeout: 30,
            hard_timeout: 60,
        }
    }
}

/// The ordered classification table. Classes are evaluated top to bottom and the first match
/// wins; traffic matching none of them falls back to [`ClassTable::fallback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTable {
    pub classes: Vec<TrafficClassConfig>,
    pub fallback: TrafficClassConfig,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::smart_city()
    }
}

impl ClassTable {
    /// The smart-city service table: five prioritised service networks and a default class.
    pub fn smart_city() -> Self {
        Self {
            classes: vec![
                TrafficClassConfig::priority_class("Healthcare", "10.2.0.0/24", 200, 1),
                TrafficClassConfig::priority_class("PublicSafety", "10.3.0.0/24", 150, 2),
                TrafficClassConfig::priority_class("EnergyGrid", "10.4.0.0/24", 100, 3),
                TrafficClassConfig::priority_class("SmartHomes", "10.5.0.0/24", 80, 4),
                TrafficClassConfig::priority_class("Education", "10.6.0.0/24", 60, 5),
            ],
            fallback: TrafficClassConfig {
                name: "Default".to_string(),
                ranges: Vec::new(),
                priority: 50,
                queue: None,
                idle_timeout: 20,
                hard_timeout: 40,
            },
        }
    }

    /// Parses a table from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let table: Self = serde_yaml::from_str(yaml)?;
        table.validate()?;
        Ok(table)
    }

    /// Loads a table from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading traffic classes from {}", path.display());

        let file = File::open(path)?;
        let table: Self = serde_yaml::from_reader(file)?;
        table.validate()?;

        Ok(table)
    }

    /// Checks that class names are non-empty and unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = FxHashSet::default();

        for class in self.classes.iter().chain(std::iter::once(&self.fallback)) {
            if class.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }

            if !seen.insert(class.name.as_str()) {
                return Err(ConfigError::DuplicateClass(class.name.clone()));
            }
        }

        if !self.fallback.ranges.is_empty() {
            warn!(class = %self.fallback.name, "Ranges on the fallback class are ignored");
        }

        Ok(())
    }
}

/// Friendly names of the smart-city switches.
pub fn smart_city_switch_names() -> FxHashMap<DatapathId, String> {
    [
        (1, "Traffic Control Switch"),
        (2, "Healthcare Switch"),
        (3, "Public Safety Switch"),
        (4, "Energy Grid Switch"),
        (5, "Smart Homes Switch"),
        (6, "Education Switch"),
    ]
    .into_iter()
    .map(|(dpid, name)| (dpid, name.to_string()))
    .collect()
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Interval between flow-statistics requests to every switch. Also the window used to turn
    /// byte counts into bandwidth.
    pub(crate) poll_interval: Duration,
    /// Interval between top-talker reports.
    pub(crate) report_interval: Duration,
    /// Number of sources per top-talker report.
    pub(crate) top_n: usize,
    /// Sources not seen for longer than this are evicted, resetting their count.
    pub(crate) inactivity_timeout: Duration,
    /// Friendly switch names, by datapath id.
    pub(crate) switch_names: FxHashMap<DatapathId, String>,
    /// The classification table.
    pub(crate) class_table: ClassTable,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            top_n: DEFAULT_TOP_N,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            switch_names: smart_city_switch_names(),
            class_table: ClassTable::default(),
        }
    }
}

impl ControllerOptions {
    /// Sets the statistics polling interval. Zero intervals are raised to one millisecond.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets the top-talker reporting interval. Zero intervals are raised to one millisecond.
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets the number of sources per top-talker report.
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Sets how long a source may go unseen before it is evicted and its count reset.
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Sets the friendly name of a switch.
    pub fn switch_name(mut self, dpid: DatapathId, name: impl Into<String>) -> Self {
        self.switch_names.insert(dpid, name.into());
        self
    }

    /// Replaces the whole switch name table.
    pub fn switch_names(mut self, names: FxHashMap<DatapathId, String>) -> Self {
        self.switch_names = names;
        self
    }

    /// Sets the classification table.
    pub fn class_table(mut self, table: ClassTable) -> Self {
        self.class_table = table;
        self
    }
}
