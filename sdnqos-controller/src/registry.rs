use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::SwitchHandle;
use sdnqos_wire::flow::DatapathId;

/// Connected switches, by datapath id.
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    switches: FxHashMap<DatapathId, SwitchHandle>,
    /// Static friendly-name table. Independent of which switches are connected.
    names: FxHashMap<DatapathId, String>,
}

impl SwitchRegistry {
    pub fn new(names: FxHashMap<DatapathId, String>) -> Self {
        Self { switches: FxHashMap::default(), names }
    }

    /// Registers a switch. If a switch with the same id was already registered (a reconnect),
    /// its stale handle is replaced and returned.
    pub fn register(&mut self, handle: SwitchHandle) -> Option<SwitchHandle> {
        self.switches.insert(handle.dpid(), handle)
    }

    pub fn remove(&mut self, dpid: DatapathId) -> Option<SwitchHandle> {
        self.switches.remove(&dpid)
    }

    #[inline]
    pub fn get(&self, dpid: DatapathId) -> Option<&SwitchHandle> {
        self.switches.get(&dpid)
    }

    #[inline]
    pub fn contains(&self, dpid: DatapathId) -> bool {
        self.switches.contains_key(&dpid)
    }

    /// Clones out every registered handle, so the caller can send without holding the lock.
    pub fn handles(&self) -> Vec<SwitchHandle> {
        self.switches.values().cloned().collect()
    }

    /// Registered datapath ids, ascending.
    pub fn dpids(&self) -> Vec<DatapathId> {
        let mut dpids: Vec<_> = self.switches.keys().copied().collect();
        dpids.sort_unstable();
        dpids
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.switches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// The configured friendly name of a switch, if any.
    #[inline]
    pub fn name(&self, dpid: DatapathId) -> Option<&str> {
        self.names.get(&dpid).map(String::as_str)
    }

    /// The friendly name of a switch, or `Switch <dpid>` if it has none.
    pub fn display_name(&self, dpid: DatapathId) -> Cow<'_, str> {
        match self.name(dpid) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("Switch {dpid}")),
        }
    }
}
