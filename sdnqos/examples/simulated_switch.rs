//! Runs the controller against a couple of simulated switches and prints the telemetry feed
//! as a dashboard would receive it.

use std::{net::Ipv4Addr, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::codec::Framed;

use sdnqos::{
    flow::{FlowMod, FlowStatsEntry, PacketIn, SwitchCommand},
    Controller, ControllerOptions, PubSocket, SwitchEvent, SwitchHandle, TelemetryEvent,
    FLOW_STATS_TOPIC, TOP_TALKERS_TOPIC,
};
use sdnqos_wire::telemetry::{Codec, Message};

/// A switch that keeps a flow table, counts traffic on installed rules and answers
/// statistics requests.
async fn simulated_switch(dpid: u64, subnet: u8, events: mpsc::Sender<SwitchEvent>) {
    let (handle, mut commands) = SwitchHandle::channel(dpid, 64);
    events.send(SwitchEvent::Connected(handle)).await.unwrap();

    let mut table: Vec<(FlowMod, FlowStatsEntry)> = Vec::new();
    let mut traffic = tokio::time::interval(Duration::from_millis(700));

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SwitchCommand::DeleteAllFlows) => table.clear(),
                Some(SwitchCommand::InstallFlow(rule)) => {
                    tracing::info!(dpid, priority = rule.priority, flow = %rule.flow_match, "Installed rule");
                    let entry = FlowStatsEntry {
                        priority: rule.priority,
                        flow_match: rule.flow_match,
                        ..Default::default()
                    };
                    table.push((rule, entry));
                }
                Some(SwitchCommand::RequestFlowStats) => {
                    let entries = table.iter().map(|(_, entry)| entry.clone()).collect();
                    if events.send(SwitchEvent::FlowStatsReply { dpid, entries }).await.is_err() {
                        break;
                    }
                }
                Some(SwitchCommand::PacketOut(_)) => {}
                None => break,
            },
            _ = traffic.tick() => {
                let (src, dst) = {
                    let mut rng = rand::thread_rng();
                    (Ipv4Addr::new(10, subnet, 0, rng.gen_range(2..6)), Ipv4Addr::new(10, 1, 0, rng.gen_range(2..4)))
                };

                // Count the packet on a matching rule, or hand it to the controller.
                let mut matched = false;
                for (rule, entry) in &mut table {
                    if rule.flow_match.ipv4_src == Some(src) && rule.flow_match.ipv4_dst == Some(dst) {
                        entry.packet_count += 100;
                        entry.byte_count += 100 * 1_500;
                        matched = true;
                    }
                }

                if !matched {
                    let packet = PacketIn { dpid, in_port: 1, buffer_id: None, data: ipv4_frame(src, dst) };
                    if events.send(SwitchEvent::PacketIn(packet)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

fn ipv4_frame(src: Ipv4Addr, dst: Ipv4Addr) -> Bytes {
    let mut frame = vec![0u8; 34];
    frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
    frame[14] = 0x45;
    frame[26..30].copy_from_slice(&src.octets());
    frame[30..34].copy_from_slice(&dst.octets());
    Bytes::from(frame)
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut telemetry = PubSocket::new();
    telemetry.bind("127.0.0.1:0").await.unwrap();
    let addr = telemetry.local_addr().unwrap();
    tracing::info!("Telemetry published on {}", addr);

    // Dashboard side
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut dashboard = Framed::new(stream, Codec::new());
    dashboard.send(Message::subscribe(FLOW_STATS_TOPIC).unwrap()).await.unwrap();
    dashboard.send(Message::subscribe(TOP_TALKERS_TOPIC).unwrap()).await.unwrap();

    let options = ControllerOptions::default()
        .poll_interval(Duration::from_secs(1))
        .report_interval(Duration::from_secs(2));
    let controller = Controller::new(options, telemetry);
    let handle = controller.handle();

    let (events_tx, events_rx) = mpsc::channel(256);
    let controller_task = tokio::spawn(controller.run(events_rx));

    tokio::spawn(simulated_switch(2, 2, events_tx.clone()));
    tokio::spawn(simulated_switch(6, 6, events_tx));

    let printer = tokio::spawn(async move {
        while let Some(Ok(msg)) = dashboard.next().await {
            let topic = String::from_utf8_lossy(msg.topic()).to_string();
            match TelemetryEvent::from_payload(&topic, msg.payload()) {
                Ok(Some(event)) => tracing::info!(seq = msg.seq(), "{:?}", event),
                Ok(None) => tracing::warn!(%topic, "Unknown topic"),
                Err(e) => tracing::warn!(%topic, "Bad payload: {e}"),
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(10)).await;
    tracing::info!("Top talkers: {:?}", handle.top_talkers());

    handle.shutdown();
    controller_task.await.unwrap();
    printer.abort();
}
