//! Integration tests for the async client over a simulated air
//!
//! Several independent bridges share one `SimAir`, each with its own
//! transport, work item and dispatcher task.

use radiohead_bridge::client::EventReceiver;
use radiohead_bridge::constants::{BROADCAST_ADDRESS, DEFAULT_RETRIES};
use radiohead_bridge::sim::{SimAir, SimConnector};
use radiohead_bridge::{BridgeError, BridgeOptions, ClientEvent, Datagram, RadioClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn node(air: &SimAir, address: u8) -> (RadioClient<SimConnector>, EventReceiver) {
    let (client, events) = RadioClient::with_options(
        air.connector(),
        BridgeOptions {
            poll_interval: Duration::from_millis(1),
        },
    );
    client.open("sim", 9600, address).unwrap();
    client.start().unwrap();
    (client, events)
}

/// Next datagram, skipping lifecycle events
async fn next_datagram(events: &mut EventReceiver) -> Datagram {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("datagram timed out")
            .expect("client closed");
        match event {
            ClientEvent::Data(datagram) => return datagram,
            ClientEvent::ReceiveError(e) => panic!("unexpected receive error: {}", e),
            ClientEvent::Started | ClientEvent::Stopped => {}
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_nodes_exchange() {
    let air = SimAir::new();
    let (a, mut a_events) = node(&air, 0x01);
    let (b, mut b_events) = node(&air, 0x02);

    a.send(0x02, b"ping").await.unwrap();
    let got = next_datagram(&mut b_events).await;
    assert_eq!(got.from, 0x01);
    assert_eq!(got.to, 0x02);
    assert_eq!(&got.data[..], b"ping");

    b.send(got.from, b"pong").await.unwrap();
    let reply = next_datagram(&mut a_events).await;
    assert_eq!(reply.from, 0x02);
    assert_eq!(&reply.data[..], b"pong");

    assert_eq!(a.stats().snapshot().tx_frames, 1);
    assert_eq!(a.stats().snapshot().rx_frames, 1);

    a.stop().await.unwrap();
    b.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_echo_server_task() {
    let air = SimAir::new();
    let (client, mut client_events) = node(&air, 0x01);
    let (server, mut server_events) = node(&air, 0x02);
    let server = Arc::new(server);

    let echo = {
        let server = server.clone();
        tokio::spawn(async move {
            while let Some(event) = server_events.recv().await {
                if let ClientEvent::Data(datagram) = event {
                    let _ = server.send(datagram.from, &datagram.data).await;
                }
            }
        })
    };

    for i in 0..5u8 {
        let message = [b'm', i];
        client.send(0x02, &message).await.unwrap();
        let reply = next_datagram(&mut client_events).await;
        assert_eq!(&reply.data[..], &message);
        assert_eq!(reply.id, i);
    }

    client.stop().await.unwrap();
    server.stop().await.unwrap();
    echo.abort();
}

#[tokio::test]
async fn test_unreachable_peer_fails_send() {
    let air = SimAir::new();
    let (a, _events) = node(&air, 0x01);

    let err = a.send(0x09, b"anyone?").await.unwrap_err();
    assert!(matches!(err, BridgeError::SendFailed { to: 0x09 }));
    assert_eq!(a.retransmissions().unwrap(), DEFAULT_RETRIES as u32);

    a.reset_retransmissions().unwrap();
    assert_eq!(a.retransmissions().unwrap(), 0);
    a.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_broadcast_and_promiscuous() {
    let air = SimAir::new();
    let (a, _a_events) = node(&air, 0x01);
    let (_b, mut b_events) = node(&air, 0x02);
    let (spy, mut spy_events) = node(&air, 0x03);
    spy.set_promiscuous(true).unwrap();

    a.send(BROADCAST_ADDRESS, b"all").await.unwrap();
    assert_eq!(next_datagram(&mut b_events).await.to, BROADCAST_ADDRESS);
    assert_eq!(next_datagram(&mut spy_events).await.to, BROADCAST_ADDRESS);

    a.send(0x02, b"private").await.unwrap();
    let seen = next_datagram(&mut spy_events).await;
    assert_eq!(seen.to, 0x02);
    assert_eq!(&seen.data[..], b"private");
}

#[tokio::test]
async fn test_duplicate_address_refused() {
    let air = SimAir::new();
    let (_a, _events) = node(&air, 0x01);

    let (dup, _dup_events) = RadioClient::new(air.connector());
    assert!(matches!(
        dup.open("sim", 9600, 0x01),
        Err(BridgeError::TransportInit { .. })
    ));
}

#[tokio::test]
async fn test_close_frees_address() {
    let air = SimAir::new();
    let (a, _events) = node(&air, 0x01);
    assert!(matches!(a.close(), Err(BridgeError::WorkerStillActive)));

    a.stop().await.unwrap();
    a.close().unwrap();
    assert_eq!(air.node_count(), 0);

    let (again, _again_events) = RadioClient::new(air.connector());
    again.open("sim", 9600, 0x01).unwrap();
    assert_eq!(again.this_address().unwrap(), 0x01);
}
