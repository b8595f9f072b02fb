//! Reconnection behavior against a controllable loopback server.
//!
//! The harness accepts raw WebSocket sessions one at a time, which makes
//! dropped connections and dead endpoints easy to stage.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use taskwire_client::{
    ClientConfig, ConnectionStatus, CredentialStore, GatewayClient, MemoryCredentialStore,
};
use taskwire_core::backoff::ReconnectPolicy;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const TIMEOUT: Duration = Duration::from_secs(5);

/// A reconnect policy fast enough for tests.
fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts: 5,
        base_delay_ms: 20,
        max_delay_ms: 100,
        jitter_factor: 0.0,
    }
}

async fn harness() -> (TcpListener, ClientConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ClientConfig {
        url: format!("ws://{addr}"),
        token_key: "token".into(),
        reconnect: fast_policy(),
    };
    (listener, config)
}

async fn accept_session(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(TIMEOUT, listener.accept())
        .await
        .expect("timed out waiting for client dial")
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

/// Read the next text frame as JSON.
async fn recv_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: &Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Accept a session, assert the automatic authenticate frame carries the
/// expected token, and acknowledge it.
async fn accept_and_authenticate(
    listener: &TcpListener,
    expected_token: &str,
    user: &str,
) -> WebSocketStream<TcpStream> {
    let mut ws = accept_session(listener).await;
    let frame = recv_json(&mut ws).await;
    assert_eq!(frame["type"], "authenticate");
    assert_eq!(frame["token"], expected_token);
    send_json(&mut ws, &json!({ "type": "authenticated", "data": { "userId": user } })).await;
    ws
}

async fn wait_for_status(
    rx: &mut watch::Receiver<ConnectionStatus>,
    expected: ConnectionStatus,
) {
    let result = timeout(TIMEOUT, async {
        loop {
            if *rx.borrow_and_update() == expected {
                return;
            }
            rx.changed().await.unwrap();
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {expected:?}");
}

#[tokio::test]
async fn connect_authenticates_with_stored_token() {
    let (listener, config) = harness().await;
    let store = Arc::new(MemoryCredentialStore::with_token("token", "tok-1"));
    let client = GatewayClient::new(config, store);
    let mut status = client.status();

    client.connect().await;
    let _ws = accept_and_authenticate(&listener, "tok-1", "u1").await;

    wait_for_status(&mut status, ConnectionStatus::Connected { authenticated: true }).await;
}

#[tokio::test]
async fn dropped_connection_reconnects_and_reauthenticates() {
    let (listener, config) = harness().await;
    let store = Arc::new(MemoryCredentialStore::with_token("token", "tok-1"));
    let client = GatewayClient::new(config, store.clone());
    let mut status = client.status();

    client.connect().await;
    let ws = accept_and_authenticate(&listener, "tok-1", "u1").await;
    wait_for_status(&mut status, ConnectionStatus::Connected { authenticated: true }).await;

    // token refreshed while connected, then the connection dies
    store.set("token", "tok-2");
    drop(ws);

    // the client comes back on its own with the fresh credential
    let _ws = accept_and_authenticate(&listener, "tok-2", "u1").await;
    wait_for_status(&mut status, ConnectionStatus::Connected { authenticated: true }).await;
}

#[tokio::test]
async fn pushed_events_reach_subscribers() {
    let (listener, config) = harness().await;
    let store = Arc::new(MemoryCredentialStore::with_token("token", "tok-1"));
    let client = GatewayClient::new(config, store);
    let mut events = client.subscribe("task_shared");

    client.connect().await;
    let mut ws = accept_and_authenticate(&listener, "tok-1", "u1").await;

    let payload = json!({ "task": { "taskId": "t1" }, "sharedBy": "owner" });
    send_json(&mut ws, &json!({ "type": "task_shared", "data": payload })).await;

    let received = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_eq!(received, payload);
}

#[tokio::test]
async fn send_forwards_frames_only_while_connected() {
    let (listener, config) = harness().await;
    let store = Arc::new(MemoryCredentialStore::with_token("token", "tok-1"));
    let client = GatewayClient::new(config, store);
    let mut status = client.status();

    let frame = json!({ "type": "mark_read", "taskId": "t1" });
    assert!(client.send(&frame).await.is_err());

    client.connect().await;
    let mut ws = accept_and_authenticate(&listener, "tok-1", "u1").await;
    wait_for_status(&mut status, ConnectionStatus::Connected { authenticated: true }).await;

    client.send(&frame).await.unwrap();
    assert_eq!(recv_json(&mut ws).await, frame);
}

#[tokio::test]
async fn sign_out_during_backoff_stops_retrying() {
    let (listener, mut config) = harness().await;
    config.reconnect.base_delay_ms = 500;
    config.reconnect.max_delay_ms = 500;
    let store = Arc::new(MemoryCredentialStore::with_token("token", "tok-1"));
    let client = GatewayClient::new(config, store.clone());
    let mut status = client.status();

    client.connect().await;
    let ws = accept_and_authenticate(&listener, "tok-1", "u1").await;
    wait_for_status(&mut status, ConnectionStatus::Connected { authenticated: true }).await;

    drop(ws);
    wait_for_status(&mut status, ConnectionStatus::Connecting).await;

    client.sign_out().await;
    wait_for_status(&mut status, ConnectionStatus::Offline).await;
    assert!(store.get("token").is_none());

    // no further dial arrives after the backoff window passes
    let redial = timeout(Duration::from_millis(800), listener.accept()).await;
    assert!(redial.is_err(), "client dialed after sign-out");
}

#[tokio::test]
async fn gives_up_after_exhausting_attempts() {
    let (listener, mut config) = harness().await;
    config.reconnect.max_attempts = 2;
    drop(listener); // nothing is listening any more

    let store = Arc::new(MemoryCredentialStore::with_token("token", "tok-1"));
    let client = GatewayClient::new(config, store);
    let mut status = client.status();

    client.connect().await;
    wait_for_status(&mut status, ConnectionStatus::Exhausted).await;
}

#[tokio::test]
async fn deliberate_disconnect_does_not_reconnect() {
    let (listener, config) = harness().await;
    let store = Arc::new(MemoryCredentialStore::with_token("token", "tok-1"));
    let client = GatewayClient::new(config, store);
    let mut status = client.status();

    client.connect().await;
    let mut ws = accept_and_authenticate(&listener, "tok-1", "u1").await;
    wait_for_status(&mut status, ConnectionStatus::Connected { authenticated: true }).await;

    client.disconnect().await;
    wait_for_status(&mut status, ConnectionStatus::Offline).await;

    // the server side sees a clean close, and no redial follows
    loop {
        match timeout(TIMEOUT, ws.next()).await.unwrap() {
            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
            Some(Ok(_)) => {}
        }
    }
    let redial = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(redial.is_err(), "client dialed after deliberate disconnect");
}
