use std::{fmt, net::Ipv4Addr, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    ControllerOptions, DefaultFlowManager, FlowClassifier, FlowInstaller, StatsAggregator,
    StatsPoller, SwitchEvent, SwitchHandle, SwitchRegistry, TopTalkerReporter, TrafficCounters,
};
use sdnqos_telemetry::{TelemetryEvent, TelemetryPublisher, TopTalker};
use sdnqos_wire::{
    flow::{DatapathId, FlowStatsEntry, PacketIn},
    packet::Packet,
};

type SharedPublisher = Arc<dyn TelemetryPublisher>;

/// The QoS controller. Owns the switch registry and the traffic counters, dispatches switch
/// events and drives the statistics poller and the top-talker reporter.
///
/// Events are handled one at a time, in the order they arrive on the event channel.
pub struct Controller {
    options: ControllerOptions,
    registry: Arc<RwLock<SwitchRegistry>>,
    counters: Arc<Mutex<TrafficCounters>>,
    classifier: FlowClassifier,
    default_flows: DefaultFlowManager,
    installer: FlowInstaller,
    aggregator: StatsAggregator,
    publisher: SharedPublisher,
    shutdown: CancellationToken,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(options: ControllerOptions, publisher: impl TelemetryPublisher) -> Self {
        Self {
            registry: Arc::new(RwLock::new(SwitchRegistry::new(options.switch_names.clone()))),
            counters: Arc::new(Mutex::new(TrafficCounters::new())),
            classifier: FlowClassifier::new(&options.class_table),
            default_flows: DefaultFlowManager,
            installer: FlowInstaller,
            aggregator: StatsAggregator::new(options.poll_interval),
            publisher: Arc::new(publisher),
            shutdown: CancellationToken::new(),
            options,
        }
    }

    /// Returns a handle that can be used to inspect and stop the controller while it runs.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            registry: Arc::clone(&self.registry),
            counters: Arc::clone(&self.counters),
            publisher: Arc::clone(&self.publisher),
            shutdown: self.shutdown.clone(),
            top_n: self.options.top_n,
        }
    }

    #[inline]
    pub fn classifier(&self) -> &FlowClassifier {
        &self.classifier
    }

    /// Processes events until the channel closes or the controller is shut down. The statistics
    /// poller and the top-talker reporter run alongside and are stopped before this returns.
    pub async fn run(self, mut events: mpsc::Receiver<SwitchEvent>) {
        let poller = StatsPoller::new(Arc::clone(&self.registry))
            .spawn(self.options.poll_interval, self.shutdown.child_token());

        let reporter = TopTalkerReporter::new(
            Arc::clone(&self.counters),
            Arc::clone(&self.publisher),
            self.options.top_n,
            self.options.inactivity_timeout,
        )
        .spawn(self.options.report_interval, self.shutdown.child_token());

        info!(
            poll_interval = ?self.options.poll_interval,
            report_interval = ?self.options.report_interval,
            "Controller started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("Switch event channel closed");
                        break;
                    }
                },
            }
        }

        self.shutdown.cancel();

        for (name, task) in [("stats-poller", poller), ("top-talker-reporter", reporter)] {
            if let Err(e) = task.await {
                error!(task = name, err = ?e, "Background task failed");
            }
        }

        info!("Controller stopped");
    }

    /// Dispatches a single switch event.
    pub fn handle_event(&self, event: SwitchEvent) {
        match event {
            SwitchEvent::Connected(switch) => self.on_switch_connected(switch),
            SwitchEvent::Disconnected(dpid) => self.on_switch_disconnected(dpid),
            SwitchEvent::PacketIn(packet) => self.on_packet_in(packet),
            SwitchEvent::FlowStatsReply { dpid, entries } => self.on_flow_stats(dpid, &entries),
        }
    }

    fn on_switch_connected(&self, switch: SwitchHandle) {
        let dpid = switch.dpid();

        let name = {
            let mut registry = self.registry.write();
            if registry.register(switch.clone()).is_some() {
                warn!(dpid, "Switch reconnected, replacing stale handle");
            }
            registry.display_name(dpid).into_owned()
        };

        info!(dpid, name = %name, "Switch connected");

        if let Err(e) = self.default_flows.on_switch_connected(&switch) {
            error!(dpid, err = ?e, "Failed to install default flows");
        }
    }

    fn on_switch_disconnected(&self, dpid: DatapathId) {
        let (removed, name) = {
            let mut registry = self.registry.write();
            (registry.remove(dpid).is_some(), registry.display_name(dpid).into_owned())
        };

        if !removed {
            debug!(dpid, "Disconnect from unknown switch");
            return;
        }

        info!(dpid, name = %name, "Switch disconnected");
        self.publisher.publish(TelemetryEvent::Alert(serde_json::json!({
            "kind": "switch_disconnected",
            "switch_id": dpid,
            "name": name,
        })));
    }

    fn on_packet_in(&self, packet: PacketIn) {
        let dpid = packet.dpid;
        let Some(switch) = self.registry.read().get(dpid).cloned() else {
            warn!(dpid, "Packet-in from unregistered switch, dropping");
            return;
        };

        let parsed = match Packet::parse(&packet.data) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(dpid, in_port = packet.in_port, err = ?e, "Malformed frame, dropping");
                return;
            }
        };

        match parsed {
            Packet::Arp => {
                debug!(dpid, in_port = packet.in_port, "Flooding ARP");
                self.flood(&switch, &packet);
            }
            Packet::Ipv4 { src, dst } => {
                let class = self.classifier.classify(src, dst);
                info!(dpid, %src, %dst, class = class.name(), priority = class.priority(), "Classified flow");

                if let Err(e) = self.installer.install(&switch, class, src, dst) {
                    error!(dpid, %src, %dst, class = class.name(), err = ?e, "Failed to install flow pair");
                }
                self.flood(&switch, &packet);
            }
            Packet::Other { ether_type } => {
                debug!(dpid, ether_type, "Dropping non-IP frame");
            }
        }
    }

    fn flood(&self, switch: &SwitchHandle, packet: &PacketIn) {
        if let Err(e) = self.installer.flood(switch, packet) {
            error!(dpid = switch.dpid(), err = ?e, "Failed to flood packet");
        }
    }

    fn on_flow_stats(&self, dpid: DatapathId, entries: &[FlowStatsEntry]) {
        let name = self.registry.read().display_name(dpid).into_owned();

        let snapshot = {
            let mut counters = self.counters.lock();
            self.aggregator.on_reply(dpid, name, entries, &mut counters, Instant::now())
        };

        debug!(
            dpid,
            flows = snapshot.flow_count,
            packets = snapshot.packet_count,
            bandwidth_mbps = snapshot.bandwidth_mbps,
            "Flow stats"
        );
        self.publisher.publish(TelemetryEvent::FlowStats(snapshot));
    }
}

/// A cloneable handle to a [`Controller`].
#[derive(Clone)]
pub struct ControllerHandle {
    registry: Arc<RwLock<SwitchRegistry>>,
    counters: Arc<Mutex<TrafficCounters>>,
    publisher: SharedPublisher,
    shutdown: CancellationToken,
    top_n: usize,
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("switches", &self.switches())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ControllerHandle {
    /// Stops the event loop and the background tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Publishes a freeform alert.
    pub fn alert(&self, payload: serde_json::Value) {
        self.publisher.publish(TelemetryEvent::Alert(payload));
    }

    /// The ids of the registered switches, ascending.
    pub fn switches(&self) -> Vec<DatapathId> {
        self.registry.read().dpids()
    }

    /// The current top-talker ranking. Doesn't publish or reset anything.
    pub fn top_talkers(&self) -> Vec<TopTalker> {
        self.counters.lock().top(self.top_n)
    }

    /// The cumulative packet count of a source.
    pub fn traffic_count(&self, src: Ipv4Addr) -> u64 {
        self.counters.lock().packets(src)
    }
}
