//! Integration tests for the reconnecting signaling client
//!
//! Each test runs a throwaway rendezvous endpoint on an ephemeral local port
//! and drives the client against it: connect, lose the connection, verify
//! the scheduled reconnect, queue flushing, and shutdown.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use livecast_core::ViewerId;
use livecast_signaling::{
    ClientEvent, PeerRole, SignalingClient, SignalingConfig, SignalingMessage, TransportState,
};

const WAIT: Duration = Duration::from_secs(5);

async fn local_endpoint() -> (TcpListener, SignalingConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = SignalingConfig {
        url: format!("ws://{addr}"),
        retry_delay: Duration::from_millis(200),
        max_queue_depth: 2,
    };
    (listener, config)
}

async fn accept_one(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    timeout(WAIT, accept_async(stream)).await.unwrap().unwrap()
}

async fn recv_message(server: &mut WebSocketStream<TcpStream>) -> SignalingMessage {
    loop {
        match timeout(WAIT, server.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("server connection ended unexpectedly: {other:?}"),
        }
    }
}

async fn wait_for_state(client: &SignalingClient, state: TransportState) {
    timeout(WAIT, async {
        while client.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("client never reached {state:?}"));
}

fn chat(text: &str) -> SignalingMessage {
    SignalingMessage::ChatMessage {
        sender: "broadcaster".to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_connect_sends_and_receives() {
    let (listener, config) = local_endpoint().await;
    let (client, mut events) = SignalingClient::connect(config);

    let mut server = accept_one(&listener).await;
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Opened)
    );

    client
        .send(SignalingMessage::Join {
            role: PeerRole::Broadcaster,
        })
        .unwrap();
    assert_eq!(
        recv_message(&mut server).await,
        SignalingMessage::Join {
            role: PeerRole::Broadcaster,
        }
    );

    server
        .send(Message::Text(
            r#"{"type":"new_viewer","viewerId":"v1"}"#.to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Message(SignalingMessage::NewViewer {
            viewer_id: ViewerId::new("v1"),
        }))
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let (listener, config) = local_endpoint().await;
    let (client, mut events) = SignalingClient::connect(config);

    let mut server = accept_one(&listener).await;
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Opened)
    );

    server
        .send(Message::Text("{not json".to_string()))
        .await
        .unwrap();
    server
        .send(Message::Text(r#"{"type":"mystery"}"#.to_string()))
        .await
        .unwrap();
    server
        .send(Message::Text(r#"{"type":"viewer_count","count":4}"#.to_string()))
        .await
        .unwrap();

    // The malformed frames are skipped; the next valid one still arrives.
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Message(SignalingMessage::ViewerCount {
            count: 4
        }))
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_flushes_queue_oldest_first() {
    let (listener, config) = local_endpoint().await;
    let (client, mut events) = SignalingClient::connect(config);

    let server = accept_one(&listener).await;
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Opened)
    );

    // Drop the connection; the client schedules exactly one reconnect.
    drop(server);
    wait_for_state(&client, TransportState::RetryWait).await;

    // Three sends against a depth-2 queue: the oldest is dropped.
    client.send(chat("one")).unwrap();
    client.send(chat("two")).unwrap();
    client.send(chat("three")).unwrap();

    let mut server = accept_one(&listener).await;
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Opened)
    );

    assert_eq!(recv_message(&mut server).await, chat("two"));
    assert_eq!(recv_message(&mut server).await, chat("three"));

    client.shutdown().await;
}

#[tokio::test]
async fn test_sends_while_connecting_respect_queue_depth() {
    let (listener, config) = local_endpoint().await;
    let (client, mut events) = SignalingClient::connect(config);

    // Take the TCP connection but hold off the websocket handshake, pinning
    // the client in Connecting.
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert_eq!(client.state(), TransportState::Connecting);

    // Three sends against a depth-2 queue while still connecting: the
    // oldest is dropped, same as during a retry wait.
    client.send(chat("one")).unwrap();
    client.send(chat("two")).unwrap();
    client.send(chat("three")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut server = timeout(WAIT, accept_async(stream)).await.unwrap().unwrap();
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Opened)
    );
    assert_eq!(recv_message(&mut server).await, chat("two"));
    assert_eq!(recv_message(&mut server).await, chat("three"));

    client.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_cancels_pending_reconnect() {
    let (listener, mut config) = local_endpoint().await;
    config.retry_delay = Duration::from_secs(60);
    let (client, mut events) = SignalingClient::connect(config);

    let server = accept_one(&listener).await;
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Opened)
    );

    drop(server);
    wait_for_state(&client, TransportState::RetryWait).await;

    // Shutdown must not wait out the 60s retry delay.
    timeout(WAIT, client.shutdown()).await.unwrap();
    assert_eq!(timeout(WAIT, events.recv()).await.unwrap(), None);
}
