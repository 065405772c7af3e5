use std::{net::Ipv4Addr, time::Duration};

use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};

use sdnqos_controller::{Controller, ControllerOptions, SwitchEvent, SwitchHandle};
use sdnqos_telemetry::{ChannelPublisher, NoopPublisher, TelemetryEvent, TopTalker, TopTalkers};
use sdnqos_wire::flow::{FlowMatch, FlowMod, FlowStatsEntry, SwitchCommand};

use crate::drain;

fn top_talkers(events: &[TelemetryEvent]) -> Vec<Vec<TopTalker>> {
    events
        .iter()
        .filter_map(|event| match event {
            TelemetryEvent::TopTalkers(TopTalkers { top }) => Some(top.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn poll_report_and_decay_on_cadence() {
    let _ = tracing_subscriber::fmt::try_init();

    let start = Instant::now();
    let at = |millis: u64| start + Duration::from_millis(millis);

    let (publisher, mut telemetry) = ChannelPublisher::new(256);
    let controller = Controller::new(ControllerOptions::default(), publisher);
    let handle = controller.handle();

    let (events_tx, events_rx) = mpsc::channel(64);
    let (switch, mut commands) = SwitchHandle::channel(2, 256);
    events_tx.send(SwitchEvent::Connected(switch)).await.unwrap();

    let task = tokio::spawn(controller.run(events_rx));

    // The switch is registered before the first poll, which fires immediately.
    sleep_until(at(10)).await;
    assert_eq!(
        drain(&mut commands),
        vec![
            SwitchCommand::DeleteAllFlows,
            SwitchCommand::InstallFlow(FlowMod::table_miss()),
            SwitchCommand::RequestFlowStats,
        ]
    );
    assert_eq!(top_talkers(&drain(&mut telemetry)), vec![Vec::<TopTalker>::new()]);

    sleep_until(at(3_010)).await;
    assert_eq!(drain(&mut commands), vec![SwitchCommand::RequestFlowStats]);

    let src = Ipv4Addr::new(10, 2, 0, 2);
    events_tx
        .send(SwitchEvent::FlowStatsReply {
            dpid: 2,
            entries: vec![FlowStatsEntry {
                priority: 200,
                flow_match: FlowMatch::ipv4(src, Ipv4Addr::new(10, 1, 0, 1)),
                packet_count: 100,
                byte_count: 125_000,
            }],
        })
        .await
        .unwrap();

    sleep_until(at(3_020)).await;
    let events = drain(&mut telemetry);
    let [TelemetryEvent::FlowStats(snapshot)] = events.as_slice() else {
        panic!("expected a single flow stats event, got {events:?}");
    };
    // 125000 bytes over 3 seconds.
    assert_eq!(snapshot.bandwidth_mbps, 0.32);
    assert_eq!(snapshot.name, "Healthcare Switch");

    // Reports at 5 s and 10 s: the source was last seen at ~3 s.
    sleep_until(at(10_100)).await;
    assert_eq!(top_talkers(&drain(&mut telemetry)), vec![vec![TopTalker(src, 100)]; 2]);
    assert_eq!(handle.traffic_count(src), 100);

    // The 15 s report still ranks the source, then resets it.
    sleep_until(at(15_100)).await;
    assert_eq!(top_talkers(&drain(&mut telemetry)), vec![vec![TopTalker(src, 100)]]);
    assert_eq!(handle.traffic_count(src), 0);

    sleep_until(at(20_100)).await;
    assert_eq!(top_talkers(&drain(&mut telemetry)), vec![Vec::<TopTalker>::new()]);

    // Polls at 6, 9, 12, 15 and 18 s.
    assert_eq!(drain(&mut commands).len(), 5);

    handle.shutdown();
    task.await.unwrap();
    assert!(events_tx.is_closed());

    // Nothing runs after shutdown.
    sleep_until(at(40_000)).await;
    assert!(drain(&mut commands).is_empty());
    assert!(drain(&mut telemetry).is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_returns_when_event_channel_closes() {
    let controller = Controller::new(ControllerOptions::default(), NoopPublisher);
    let handle = controller.handle();

    let (events_tx, events_rx) = mpsc::channel(8);
    let task = tokio::spawn(controller.run(events_rx));

    drop(events_tx);
    task.await.unwrap();
    assert!(handle.is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn disconnected_switch_is_no_longer_polled() {
    let controller = Controller::new(ControllerOptions::default(), NoopPublisher);
    let handle = controller.handle();

    let (events_tx, events_rx) = mpsc::channel(8);
    let (switch, mut commands) = SwitchHandle::channel(4, 64);
    events_tx.send(SwitchEvent::Connected(switch)).await.unwrap();
    let task = tokio::spawn(controller.run(events_rx));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(drain(&mut commands).len(), 3);

    events_tx.send(SwitchEvent::Disconnected(4)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(drain(&mut commands).is_empty());
    assert!(handle.switches().is_empty());

    handle.shutdown();
    task.await.unwrap();
}
