use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::{error, warn};

use crate::{ClassTable, TrafficClassConfig};
use sdnqos_wire::flow::{Action, OutputPort};

/// A traffic class with its ranges parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficClass {
    name: String,
    ranges: Vec<Ipv4Net>,
    priority: u16,
    queue: Option<u32>,
    idle_timeout: u16,
    hard_timeout: u16,
}

impl TrafficClass {
    /// Builds a class from its configuration. Ranges that fail to parse are logged and left
    /// out, so they never match.
    fn compile(config: &TrafficClassConfig) -> Self {
        let ranges = config
            .ranges
            .iter()
            .filter_map(|raw| match parse_range(raw) {
                Some(net) => Some(net),
                None => {
                    error!(class = %config.name, range = %raw, "Invalid network range, ignoring");
                    None
                }
            })
            .collect();

        Self {
            name: config.name.clone(),
            ranges,
            priority: config.priority,
            queue: config.queue,
            idle_timeout: config.idle_timeout,
            hard_timeout: config.hard_timeout,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ranges(&self) -> &[Ipv4Net] {
        &self.ranges
    }

    #[inline]
    pub fn priority(&self) -> u16 {
        self.priority
    }

    #[inline]
    pub fn queue(&self) -> Option<u32> {
        self.queue
    }

    #[inline]
    pub fn idle_timeout(&self) -> u16 {
        self.idle_timeout
    }

    #[inline]
    pub fn hard_timeout(&self) -> u16 {
        self.hard_timeout
    }

    /// Returns true if `addr` lies in any of this class's ranges.
    #[inline]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.ranges.iter().any(|net| net.contains(&addr))
    }

    /// The actions applied to flows of this class: select the queue (if any), then forward
    /// through the switch's normal pipeline.
    pub fn actions(&self) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);
        if let Some(queue) = self.queue {
            actions.push(Action::SetQueue(queue));
        }
        actions.push(Action::Output(OutputPort::Normal));
        actions
    }
}

/// Accepts CIDR notation (host bits may be set) or a bare address.
fn parse_range(raw: &str) -> Option<Ipv4Net> {
    let raw = raw.trim();
    raw.parse::<Ipv4Net>()
        .ok()
        .or_else(|| raw.parse::<Ipv4Addr>().ok().map(Ipv4Net::from))
}

/// Maps an address pair to a traffic class using an ordered, first-match-wins table.
#[derive(Debug, Clone)]
pub struct FlowClassifier {
    classes: Vec<TrafficClass>,
    fallback: TrafficClass,
}

impl Default for FlowClassifier {
    fn default() -> Self {
        Self::new(&ClassTable::default())
    }
}

impl FlowClassifier {
    pub fn new(table: &ClassTable) -> Self {
        Self {
            classes: table.classes.iter().map(TrafficClass::compile).collect(),
            fallback: TrafficClass {
                ranges: Vec::new(),
                ..TrafficClass::compile(&table.fallback)
            },
        }
    }

    /// Returns the first class where either address lies in one of its ranges, or the fallback
    /// class if there is none.
    pub fn classify(&self, src: Ipv4Addr, dst: Ipv4Addr) -> &TrafficClass {
        self.classes
            .iter()
            .find(|class| class.contains(src) || class.contains(dst))
            .unwrap_or(&self.fallback)
    }

    /// Like [`classify`](Self::classify) for textual addresses. An address that doesn't parse is
    /// logged and never matches, the other one is still evaluated.
    pub fn classify_str(&self, src: &str, dst: &str) -> &TrafficClass {
        let src = parse_addr(src);
        let dst = parse_addr(dst);

        self.classes
            .iter()
            .find(|class| src.is_some_and(|a| class.contains(a)) || dst.is_some_and(|a| class.contains(a)))
            .unwrap_or(&self.fallback)
    }

    /// The classes in evaluation order, followed by the fallback class.
    pub fn classes(&self) -> impl Iterator<Item = &TrafficClass> {
        self.classes.iter().chain(std::iter::once(&self.fallback))
    }

    #[inline]
    pub fn fallback(&self) -> &TrafficClass {
        &self.fallback
    }
}

fn parse_addr(raw: &str) -> Option<Ipv4Addr> {
    match raw.trim().parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            warn!(addr = %raw, "Invalid IPv4 address, treating as non-match");
            None
        }
    }
}
