//! Integration tests for the /ws/events subscriber endpoint and its
//! interaction with POST /events.

use std::net::SocketAddr;
use std::time::Duration;

use eventhub_server::hub::{BroadcastHub, HubConfig};
use eventhub_server::routes;
use eventhub_server::state::AppState;
use eventhub_server::ws::WsConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start the server on a random port and return (addr, hub).
async fn start_test_server() -> (SocketAddr, BroadcastHub) {
    start_server_with(WsConfig::default()).await
}

async fn start_server_with(ws: WsConfig) -> (SocketAddr, BroadcastHub) {
    let hub = BroadcastHub::new(&HubConfig::default());
    let app = routes::build_router(AppState::new(hub.clone(), ws));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hub)
}

async fn connect(addr: SocketAddr) -> WsStream {
    let (ws_stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/events", addr))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Wait until the hub has exactly `expected` subscribers.
async fn wait_for_subscribers(hub: &BroadcastHub, expected: usize) {
    for _ in 0..200 {
        if hub.subscriber_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "Expected {} subscribers, hub has {}",
        expected,
        hub.subscriber_count()
    );
}

async fn post_event(addr: SocketAddr, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{}/events", addr))
        .json(&body)
        .send()
        .await
        .unwrap()
}

/// Read the next text frame and parse it as JSON.
async fn next_json(ws: &mut WsStream) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Expected a frame within timeout");
    match msg {
        Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected Text message, got: {:?}", other),
    }
}

async fn assert_no_frame(ws: &mut WsStream) {
    let result = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "Expected no frame, got: {:?}", result);
}

#[tokio::test]
async fn test_publish_subscribe_disconnect_scenario() {
    let (addr, hub) = start_test_server().await;

    // Published before anyone connects: never delivered
    let resp = post_event(addr, json!({ "message": "hello" })).await;
    assert_eq!(resp.status(), 202);

    let mut ws = connect(addr).await;
    wait_for_subscribers(&hub, 1).await;
    assert_no_frame(&mut ws).await;

    // Connected first: exactly one frame
    let resp = post_event(addr, json!({ "message": "hello" })).await;
    assert_eq!(resp.status(), 202);
    assert_eq!(next_json(&mut ws).await, json!({ "message": "hello" }));
    assert_no_frame(&mut ws).await;

    let session_ids = hub.registry().session_ids();
    assert_eq!(session_ids.len(), 1);

    // Disconnected: publish still accepted, session forgotten
    ws.close(None).await.expect("Failed to send close");
    wait_for_subscribers(&hub, 0).await;
    assert!(!hub.is_subscribed(&session_ids[0]));

    let resp = post_event(addr, json!({ "message": "hello" })).await;
    assert_eq!(resp.status(), 202);
}

#[tokio::test]
async fn test_fan_out_to_multiple_clients_in_order() {
    let (addr, hub) = start_test_server().await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(connect(addr).await);
    }
    wait_for_subscribers(&hub, 3).await;

    for message in ["one", "two", "three"] {
        let resp = post_event(addr, json!({ "message": message })).await;
        assert_eq!(resp.status(), 202);
    }

    for ws in &mut clients {
        assert_eq!(next_json(ws).await["message"], "one");
        assert_eq!(next_json(ws).await["message"], "two");
        assert_eq!(next_json(ws).await["message"], "three");
    }
}

#[tokio::test]
async fn test_each_connection_gets_a_distinct_session() {
    let (addr, hub) = start_test_server().await;

    let _a = connect(addr).await;
    let _b = connect(addr).await;
    wait_for_subscribers(&hub, 2).await;

    let ids = hub.registry().session_ids();
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_inbound_frames_are_ignored() {
    let (addr, hub) = start_test_server().await;

    let mut ws = connect(addr).await;
    wait_for_subscribers(&hub, 1).await;

    ws.send(Message::Text(r#"{"message":"from client"}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();

    // Nothing echoed back, nothing published
    assert_no_frame(&mut ws).await;
    assert_eq!(hub.subscriber_count(), 1);

    post_event(addr, json!({ "message": "still subscribed" })).await;
    assert_eq!(next_json(&mut ws).await["message"], "still subscribed");
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let (addr, hub) = start_test_server().await;

    let mut ws = connect(addr).await;
    wait_for_subscribers(&hub, 1).await;

    ws.send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Expected pong within timeout");
    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
        }
        other => panic!("Expected Pong message, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_abrupt_disconnect_unsubscribes() {
    let (addr, hub) = start_test_server().await;

    let ws = connect(addr).await;
    let keep = connect(addr).await;
    wait_for_subscribers(&hub, 2).await;

    // Drop the TCP stream without a close handshake
    drop(ws);
    wait_for_subscribers(&hub, 1).await;

    let mut keep = keep;
    post_event(addr, json!({ "message": "survivor" })).await;
    assert_eq!(next_json(&mut keep).await["message"], "survivor");
}

#[tokio::test]
async fn test_hub_shutdown_closes_connections() {
    let (addr, hub) = start_test_server().await;

    let mut ws = connect(addr).await;
    wait_for_subscribers(&hub, 1).await;

    hub.shutdown();

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Expected close frame within timeout");
    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(frame.code, CloseCode::Away, "Expected close code 1001");
        }
        other => panic!("Expected close frame, got: {:?}", other),
    }
    wait_for_subscribers(&hub, 0).await;

    // Further publishes and upgrades are refused
    let resp = post_event(addr, json!({ "message": "late" })).await;
    assert_eq!(resp.status(), 503);

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws/events", addr)).await;
    assert!(result.is_err(), "Upgrade should be refused after shutdown");
}

#[tokio::test]
async fn test_unresponsive_peer_is_dropped_after_pong_timeout() {
    let (addr, hub) = start_server_with(WsConfig {
        ping_interval_secs: 1,
        pong_timeout_secs: 1,
        ..WsConfig::default()
    })
    .await;

    // Never polled, so the client never answers the server's pings
    let _silent = connect(addr).await;
    wait_for_subscribers(&hub, 1).await;
    let session_id = hub.registry().session_ids().remove(0);

    // First ping after 1s, timeout 1s later
    for _ in 0..60 {
        if hub.subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(hub.subscriber_count(), 0, "Dead peer still registered");
    assert!(!hub.is_subscribed(&session_id));

    // Publishing still works with no subscribers left
    let resp = post_event(addr, json!({ "message": "after keepalive" })).await;
    assert_eq!(resp.status(), 202);
}
