//! End-to-end tests for the WebSocket transport.
//!
//! A real axum server on loopback, real tungstenite clients, and a bridge
//! driven directly from the test.

use futures::{SinkExt, StreamExt};
use serial_socket_bridge::bridge::{Bridge, BroadcastSink, SinkKind};
use serial_socket_bridge::config::BufferConfig;
use serial_socket_bridge::websocket::{build_router, serve, WsBroadcaster, WsContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as TungsteniteMessage};

struct TestServer {
    url: String,
    bridge: Arc<Bridge>,
    broadcaster: Arc<WsBroadcaster>,
}

/// Start a server whose bridge flushes to the WebSocket broadcaster.
async fn start_test_server(buffers: BufferConfig) -> TestServer {
    let bridge = Arc::new(Bridge::new(&buffers));
    let broadcaster = Arc::new(WsBroadcaster::new());
    let sink: Arc<dyn BroadcastSink> = broadcaster.clone();
    assert!(bridge.attach(SinkKind::WebSocket, Arc::downgrade(&sink)));

    let router = build_router(WsContext::new(broadcaster.clone(), bridge.clone()), "/ws");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get address");

    tokio::spawn(serve(listener, router, std::future::pending()));

    TestServer {
        url: format!("ws://127.0.0.1:{}/ws", addr.port()),
        bridge,
        broadcaster,
    }
}

/// Wait until `n` clients have subscribed to the broadcaster.
async fn wait_for_clients(broadcaster: &WsBroadcaster, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while broadcaster.client_count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("clients never subscribed");
}

#[tokio::test]
async fn test_flush_arrives_as_binary_frame() {
    let server = start_test_server(BufferConfig::default()).await;
    let (ws_stream, _) = connect_async(&server.url)
        .await
        .expect("Failed to connect");
    let (_write, mut read) = ws_stream.split();
    wait_for_clients(&server.broadcaster, 1).await;

    server.bridge.write(b"ok T:21.0\n");

    let msg = tokio::time::timeout(Duration::from_secs(1), read.next())
        .await
        .expect("Timeout waiting for message")
        .expect("No message received")
        .expect("WebSocket error");
    match msg {
        TungsteniteMessage::Binary(data) => assert_eq!(data, b"ok T:21.0\n".to_vec()),
        other => panic!("Expected binary message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_all_clients_receive_flush() {
    let server = start_test_server(BufferConfig::default()).await;
    let (first, _) = connect_async(&server.url).await.unwrap();
    let (second, _) = connect_async(&server.url).await.unwrap();
    wait_for_clients(&server.broadcaster, 2).await;

    server.bridge.write(b"echo:busy\n");

    for stream in [first, second] {
        let (_write, mut read) = stream.split();
        let msg = tokio::time::timeout(Duration::from_secs(1), read.next())
            .await
            .expect("Timeout waiting for message")
            .unwrap()
            .unwrap();
        assert_eq!(msg, TungsteniteMessage::Binary(b"echo:busy\n".to_vec()));
    }
}

#[tokio::test]
async fn test_client_frames_are_pushed_to_rx() {
    let server = start_test_server(BufferConfig::default()).await;
    let (ws_stream, _) = connect_async(&server.url).await.unwrap();
    let (mut write, _read) = ws_stream.split();

    write
        .send(TungsteniteMessage::Text("G28\n".to_string()))
        .await
        .unwrap();
    write
        .send(TungsteniteMessage::Binary(vec![b'M', b'1', b'0', b'5', b'\n']))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while server.bridge.available() < 9 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("inbound frames never queued");

    let drained: Vec<u8> = std::iter::from_fn(|| server.bridge.read()).collect();
    assert_eq!(drained, b"G28\nM105\n".to_vec());
}

#[tokio::test]
async fn test_oversized_client_frame_is_dropped() {
    let buffers = BufferConfig {
        rx_capacity: 4,
        ..BufferConfig::default()
    };
    let server = start_test_server(buffers).await;
    let (ws_stream, _) = connect_async(&server.url).await.unwrap();
    let (mut write, _read) = ws_stream.split();

    write
        .send(TungsteniteMessage::Text("G28 X Y\n".to_string()))
        .await
        .unwrap();
    write
        .send(TungsteniteMessage::Text("M1".to_string()))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while server.bridge.available() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("small frame never queued");

    assert_eq!(server.bridge.available(), 2);
}

#[tokio::test]
async fn test_client_count_drops_on_close() {
    let server = start_test_server(BufferConfig::default()).await;
    let (mut ws_stream, _) = connect_async(&server.url).await.unwrap();
    wait_for_clients(&server.broadcaster, 1).await;

    ws_stream.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while server.broadcaster.client_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("handler never finished");
}
