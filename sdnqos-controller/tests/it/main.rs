use std::net::Ipv4Addr;

use bytes::Bytes;
use tokio::sync::mpsc;

use sdnqos_controller::{Controller, SwitchEvent, SwitchHandle};
use sdnqos_wire::flow::SwitchCommand;

mod properties;
mod runtime;
mod scenarios;

/// An Ethernet II frame carrying a minimal IPv4 header.
fn ipv4_frame(src: Ipv4Addr, dst: Ipv4Addr) -> Bytes {
    let mut frame = vec![0u8; 14 + 20];
    frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());

    let ip = &mut frame[14..];
    ip[0] = 0x45;
    ip[9] = 6;
    ip[12..16].copy_from_slice(&src.octets());
    ip[16..20].copy_from_slice(&dst.octets());

    Bytes::from(frame)
}

/// Connects a switch and consumes the default-flow commands it receives.
async fn connect(controller: &Controller, dpid: u64) -> mpsc::Receiver<SwitchCommand> {
    let (switch, mut commands) = SwitchHandle::channel(dpid, 64);
    controller.handle_event(SwitchEvent::Connected(switch));

    assert_eq!(commands.recv().await, Some(SwitchCommand::DeleteAllFlows));
    assert!(matches!(commands.recv().await, Some(SwitchCommand::InstallFlow(_))));

    commands
}

fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}
