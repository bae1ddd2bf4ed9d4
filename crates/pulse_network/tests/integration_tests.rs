//! End-to-end tests over real TCP connections.
//!
//! These drive the network by calling `tick` by hand, so every test controls
//! exactly when handlers run and when the next frame is read.

use pulse_network::{Network, NetworkConfig, NetworkEvent, NetworkEvents, Protocol};
use serde_json::json;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Duration};

fn test_config() -> NetworkConfig {
    NetworkConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    }
}

async fn send_line(stream: &mut TcpStream, value: serde_json::Value) {
    let mut line = value.to_string();
    line.push('\n');
    stream.write_all(line.as_bytes()).await.unwrap();
}

/// Ticks until `predicate` matches a published event or the attempts run out.
async fn tick_until<F>(
    network: &Network,
    receiver: &mut broadcast::Receiver<NetworkEvent>,
    first_tick: &mut u64,
    mut predicate: F,
) -> Vec<NetworkEvent>
where
    F: FnMut(&NetworkEvent) -> bool,
{
    let mut seen = Vec::new();
    for _ in 0..200 {
        network.tick(*first_tick);
        *first_tick += 1;

        while let Ok(event) = receiver.try_recv() {
            let done = predicate(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("expected event was never published, saw {:?}", seen);
}

async fn started_network() -> (Network, SocketAddr, broadcast::Receiver<NetworkEvent>) {
    let mut network = Network::new(test_config(), NetworkEvents::default());
    let receiver = network.events().subscribe();
    let address = network.start().unwrap();
    (network, address, receiver)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handshake_and_login_over_tcp() {
    let (mut network, address, mut receiver) = started_network().await;
    let mut tick = 0;

    let mut client = TcpStream::connect(address).await.unwrap();
    send_line(
        &mut client,
        json!({
            "type": "handshake",
            "data": {
                "protocol_version": 5,
                "server_address": "localhost",
                "server_port": address.port(),
                "next_state": "login"
            }
        }),
    )
    .await;
    send_line(&mut client, json!({ "type": "login_start", "data": { "name": "Notch" } })).await;

    let events = tick_until(&network, &mut receiver, &mut tick, |event| {
        matches!(event, NetworkEvent::LoginStarted { .. })
    })
    .await;

    let switched = events
        .iter()
        .position(|event| matches!(event, NetworkEvent::ProtocolSwitched { to: Protocol::Login, .. }))
        .expect("protocol switch was published");
    let login = events
        .iter()
        .position(|event| matches!(event, NetworkEvent::LoginStarted { name, .. } if name == "Notch"))
        .expect("login start was published");
    assert!(switched < login);

    let session = network.sessions().snapshot().pop().unwrap();
    assert_eq!(session.protocol(), Protocol::Login);

    network.stop().await;
    assert!(network.sessions().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_survives_idle_ticks_before_first_frame() {
    let (mut network, address, mut receiver) = started_network().await;
    let mut tick = 0;

    let mut client = TcpStream::connect(address).await.unwrap();
    tick_until(&network, &mut receiver, &mut tick, |event| {
        matches!(event, NetworkEvent::SessionOpened { .. })
    })
    .await;

    // The reader is released and then sits waiting for bytes while ticks
    // keep asking for reads
    for _ in 0..3 {
        network.tick(tick);
        tick += 1;
        sleep(Duration::from_millis(20)).await;
    }

    let mut lines = json!({ "type": "handshake", "data": { "next_state": "login" } }).to_string();
    lines.push('\n');
    lines.push_str(&json!({ "type": "login_start", "data": { "name": "Notch" } }).to_string());
    lines.push('\n');
    client.write_all(lines.as_bytes()).await.unwrap();

    let events = tick_until(&network, &mut receiver, &mut tick, |event| {
        matches!(event, NetworkEvent::LoginStarted { .. })
    })
    .await;

    assert!(events.iter().any(|event| matches!(
        event,
        NetworkEvent::ProtocolSwitched { to: Protocol::Login, .. }
    )));
    assert!(matches!(
        events.last(),
        Some(NetworkEvent::LoginStarted { name, .. }) if name == "Notch"
    ));

    network.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_handshake_keeps_handshake_protocol() {
    let (mut network, address, mut receiver) = started_network().await;
    let mut tick = 0;

    let mut client = TcpStream::connect(address).await.unwrap();
    send_line(
        &mut client,
        json!({ "type": "handshake", "data": { "next_state": "status" } }),
    )
    .await;

    tick_until(&network, &mut receiver, &mut tick, |event| {
        matches!(event, NetworkEvent::StatusRequested { .. })
    })
    .await;

    let session = network.sessions().snapshot().pop().unwrap();
    assert_eq!(session.protocol(), Protocol::Handshake);
    assert!(session.is_open());

    network.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_start_before_handshake_is_dropped() {
    let (mut network, address, mut receiver) = started_network().await;
    let mut tick = 0;

    let mut client = TcpStream::connect(address).await.unwrap();
    send_line(&mut client, json!({ "type": "login_start", "data": { "name": "early" } })).await;
    send_line(
        &mut client,
        json!({ "type": "handshake", "data": { "next_state": "login" } }),
    )
    .await;

    let events = tick_until(&network, &mut receiver, &mut tick, |event| {
        matches!(event, NetworkEvent::ProtocolSwitched { .. })
    })
    .await;

    assert!(!events
        .iter()
        .any(|event| matches!(event, NetworkEvent::LoginStarted { .. })));

    network.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_frame_closes_session() {
    let (mut network, address, mut receiver) = started_network().await;
    let mut tick = 0;

    let mut client = TcpStream::connect(address).await.unwrap();
    client.write_all(b"this is not json\n").await.unwrap();

    tick_until(&network, &mut receiver, &mut tick, |event| {
        matches!(event, NetworkEvent::SessionClosed { .. })
    })
    .await;
    assert!(network.sessions().is_empty());

    network.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_closes_connected_clients() {
    let (mut network, address, mut receiver) = started_network().await;
    let mut tick = 0;

    let _client = TcpStream::connect(address).await.unwrap();
    tick_until(&network, &mut receiver, &mut tick, |event| {
        matches!(event, NetworkEvent::SessionOpened { .. })
    })
    .await;
    let session = network.sessions().snapshot().pop().unwrap();

    timeout(Duration::from_secs(2), network.stop()).await.unwrap();

    assert!(!session.is_open());
    assert!(!network.is_started());
    assert!(TcpStream::connect(address).await.is_err());
}
