use std::{net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::{net::TcpStream, time::timeout};
use tokio_util::codec::Framed;

use sdnqos_telemetry::{
    FlowStatsSnapshot, PubOptions, PubSocket, TelemetryEvent, TelemetryPublisher, TopTalker,
    TopTalkers, FLOW_STATS_TOPIC, TOP_TALKERS_TOPIC,
};
use sdnqos_wire::telemetry::{Codec, Message};

type Subscriber = Framed<TcpStream, Codec>;

async fn subscribe(addr: SocketAddr, topics: &[&str]) -> Subscriber {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut conn = Framed::new(stream, Codec::new());

    for topic in topics {
        conn.send(Message::subscribe(topic).unwrap()).await.unwrap();
    }

    // Give the session time to process the subscriptions.
    tokio::time::sleep(Duration::from_millis(100)).await;
    conn
}

async fn next_event(conn: &mut Subscriber) -> TelemetryEvent {
    let msg = timeout(Duration::from_secs(2), conn.next()).await.unwrap().unwrap().unwrap();
    let topic = std::str::from_utf8(msg.topic()).unwrap().to_string();
    TelemetryEvent::from_payload(&topic, msg.payload()).unwrap().unwrap()
}

fn flow_stats(switch_id: u64) -> TelemetryEvent {
    TelemetryEvent::FlowStats(FlowStatsSnapshot {
        switch_id,
        name: format!("Switch {switch_id}"),
        flow_count: 2,
        bandwidth_mbps: 0.19,
        packet_count: 150,
    })
}

#[tokio::test]
async fn delivers_subscribed_topics() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut socket = PubSocket::new();
    socket.bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let mut sub = subscribe(addr, &[FLOW_STATS_TOPIC]).await;
    assert_eq!(socket.stats().active_clients(), 1);

    socket.publish(flow_stats(3));

    assert_eq!(next_event(&mut sub).await, flow_stats(3));
    assert!(socket.stats().bytes_tx() > 0);
}

#[tokio::test]
async fn filters_unsubscribed_topics() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut socket = PubSocket::new();
    socket.bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let mut sub = subscribe(addr, &[TOP_TALKERS_TOPIC]).await;

    // Neither of these match the subscription.
    socket.publish(flow_stats(1));
    socket.publish(TelemetryEvent::Alert(json!({ "msg": "ignored" })));

    let top = TelemetryEvent::TopTalkers(TopTalkers {
        top: vec![TopTalker("10.2.0.2".parse().unwrap(), 42)],
    });
    socket.publish(top.clone());

    assert_eq!(next_event(&mut sub).await, top);
}

#[tokio::test]
async fn fans_out_to_many_subscribers() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut socket = PubSocket::new();
    socket.bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let mut sub1 = subscribe(addr, &[FLOW_STATS_TOPIC]).await;
    let mut sub2 = subscribe(addr, &[FLOW_STATS_TOPIC]).await;

    socket.publish(flow_stats(6));

    assert_eq!(next_event(&mut sub1).await, flow_stats(6));
    assert_eq!(next_event(&mut sub2).await, flow_stats(6));
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut socket = PubSocket::new();
    socket.bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let mut sub = subscribe(addr, &[FLOW_STATS_TOPIC, TOP_TALKERS_TOPIC]).await;
    sub.send(Message::unsubscribe(FLOW_STATS_TOPIC).unwrap()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    socket.publish(flow_stats(2));
    socket.publish(TelemetryEvent::TopTalkers(TopTalkers::default()));

    assert_eq!(next_event(&mut sub).await, TelemetryEvent::TopTalkers(TopTalkers::default()));
}

#[tokio::test]
async fn max_clients_rejects_extra_subscribers() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut socket = PubSocket::with_options(PubOptions::default().max_clients(1));
    socket.bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let _sub1 = subscribe(addr, &[]).await;
    assert_eq!(socket.stats().active_clients(), 1);

    let _sub2 = subscribe(addr, &[]).await;
    assert_eq!(socket.stats().active_clients(), 1);
}

#[tokio::test]
async fn publishing_unbound_socket_is_dropped_not_fatal() {
    let socket = PubSocket::new();

    socket.publish(flow_stats(1));

    assert_eq!(socket.stats().dropped(), 1);
    assert_eq!(socket.stats().published(), 0);
}
