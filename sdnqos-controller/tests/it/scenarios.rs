use std::{net::Ipv4Addr, time::Duration};

use sdnqos_controller::{Controller, ControllerOptions, SwitchEvent, SwitchHandle};
use sdnqos_telemetry::{ChannelPublisher, NoopPublisher, TelemetryEvent, TopTalker};
use sdnqos_wire::flow::{
    Action, FlowMatch, FlowMod, FlowStatsEntry, OutputPort, PacketIn, SwitchCommand,
};

use crate::{connect, drain, ipv4_frame};

fn entry(src: Ipv4Addr, packets: u64, bytes: u64) -> FlowStatsEntry {
    FlowStatsEntry {
        priority: 200,
        flow_match: FlowMatch::ipv4(src, Ipv4Addr::new(10, 1, 0, 1)),
        packet_count: packets,
        byte_count: bytes,
    }
}

#[tokio::test]
async fn switch_connect_installs_only_table_miss() {
    let _ = tracing_subscriber::fmt::try_init();

    let controller = Controller::new(ControllerOptions::default(), NoopPublisher);
    let (switch, mut commands) = SwitchHandle::channel(1, 16);

    controller.handle_event(SwitchEvent::Connected(switch));

    assert_eq!(
        drain(&mut commands),
        vec![SwitchCommand::DeleteAllFlows, SwitchCommand::InstallFlow(FlowMod::table_miss())]
    );
    assert_eq!(controller.handle().switches(), vec![1]);
}

#[tokio::test]
async fn healthcare_packet_in_installs_queue_one_pair_then_floods() {
    let _ = tracing_subscriber::fmt::try_init();

    let controller = Controller::new(ControllerOptions::default(), NoopPublisher);
    let mut commands = connect(&controller, 2).await;

    let (src, dst) = (Ipv4Addr::new(10, 2, 0, 2), Ipv4Addr::new(10, 1, 0, 5));
    let data = ipv4_frame(src, dst);
    controller.handle_event(SwitchEvent::PacketIn(PacketIn {
        dpid: 2,
        in_port: 3,
        buffer_id: None,
        data: data.clone(),
    }));

    let actions = vec![Action::SetQueue(1), Action::Output(OutputPort::Normal)];
    let forward = FlowMod {
        priority: 200,
        flow_match: FlowMatch::ipv4(src, dst),
        actions: actions.clone(),
        idle_timeout: 30,
        hard_timeout: 60,
    };
    let reverse = FlowMod { flow_match: FlowMatch::ipv4(dst, src), ..forward.clone() };

    let sent = drain(&mut commands);
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], SwitchCommand::InstallFlow(forward));
    assert_eq!(sent[1], SwitchCommand::InstallFlow(reverse));

    let SwitchCommand::PacketOut(out) = &sent[2] else {
        panic!("expected the triggering packet to be flooded");
    };
    assert_eq!(out.in_port, 3);
    assert_eq!(out.actions, vec![Action::Output(OutputPort::Flood)]);
    assert_eq!(out.data, Some(data));
}

#[tokio::test]
async fn buffered_default_packet_floods_by_reference() {
    let controller = Controller::new(ControllerOptions::default(), NoopPublisher);
    let mut commands = connect(&controller, 1).await;

    let (src, dst) = (Ipv4Addr::new(172, 16, 0, 2), Ipv4Addr::new(172, 16, 0, 3));
    controller.handle_event(SwitchEvent::PacketIn(PacketIn {
        dpid: 1,
        in_port: 1,
        buffer_id: Some(512),
        data: ipv4_frame(src, dst),
    }));

    let sent = drain(&mut commands);
    let SwitchCommand::InstallFlow(forward) = &sent[0] else {
        panic!("expected a flow install");
    };
    assert_eq!(forward.priority, 50);
    assert_eq!((forward.idle_timeout, forward.hard_timeout), (20, 40));
    assert_eq!(forward.actions, vec![Action::Output(OutputPort::Normal)]);

    let SwitchCommand::PacketOut(out) = &sent[2] else {
        panic!("expected a packet out");
    };
    assert_eq!(out.buffer_id, Some(512));
    assert_eq!(out.data, None);
}

#[tokio::test]
async fn stats_reply_produces_switch_snapshot() {
    let (publisher, mut telemetry) = ChannelPublisher::new(16);
    let options = ControllerOptions::default().poll_interval(Duration::from_secs(10));
    let controller = Controller::new(options, publisher);
    let _commands = connect(&controller, 2).await;

    controller.handle_event(SwitchEvent::FlowStatsReply {
        dpid: 2,
        entries: vec![
            entry(Ipv4Addr::new(10, 2, 0, 2), 100, 125_000),
            entry(Ipv4Addr::new(10, 2, 0, 3), 50, 125_000),
        ],
    });

    let Some(TelemetryEvent::FlowStats(snapshot)) = telemetry.recv().await else {
        panic!("expected a flow stats event");
    };
    assert_eq!(snapshot.switch_id, 2);
    assert_eq!(snapshot.name, "Healthcare Switch");
    assert_eq!(snapshot.flow_count, 2);
    assert_eq!(snapshot.packet_count, 150);
    assert!((snapshot.bandwidth_mbps - 0.19).abs() < 1e-9);
}

#[tokio::test]
async fn top_talkers_rank_cumulative_totals() {
    let controller = Controller::new(ControllerOptions::default(), NoopPublisher);
    let handle = controller.handle();
    let (a, b, c) = (Ipv4Addr::new(10, 2, 0, 2), Ipv4Addr::new(10, 3, 0, 2), Ipv4Addr::new(10, 4, 0, 2));

    controller.handle_event(SwitchEvent::FlowStatsReply {
        dpid: 1,
        entries: vec![entry(a, 10, 1_000), entry(b, 50, 5_000), entry(c, 5, 500)],
    });
    assert_eq!(handle.top_talkers(), vec![TopTalker(b, 50), TopTalker(a, 10), TopTalker(c, 5)]);

    controller.handle_event(SwitchEvent::FlowStatsReply {
        dpid: 1,
        entries: vec![entry(a, 5, 500), entry(b, 0, 0), entry(c, 20, 2_000)],
    });
    assert_eq!(handle.top_talkers(), vec![TopTalker(b, 50), TopTalker(c, 25), TopTalker(a, 15)]);
}

#[tokio::test]
async fn reconnect_replaces_handle_and_reinstalls_defaults() {
    let controller = Controller::new(ControllerOptions::default(), NoopPublisher);
    let stale = connect(&controller, 3).await;
    drop(stale);

    let mut fresh = connect(&controller, 3).await;
    assert_eq!(controller.handle().switches(), vec![3]);

    controller.handle_event(SwitchEvent::PacketIn(PacketIn {
        dpid: 3,
        in_port: 2,
        buffer_id: None,
        data: ipv4_frame(Ipv4Addr::new(10, 3, 0, 9), Ipv4Addr::new(10, 1, 0, 1)),
    }));
    assert_eq!(drain(&mut fresh).len(), 3);
}
