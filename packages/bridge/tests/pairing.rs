//! Pairing invariants over real sockets: rejection without a plugin,
//! transparent forwarding, and host replacement.

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uniview_bridge::{app, SessionRegistry, PLUGIN_NOT_READY, REPLACED};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_bridge() -> u16 {
    let registry = Arc::new(SessionRegistry::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app(registry, None)).await.unwrap();
    });
    port
}

async fn connect(port: u16, path: &str) -> Client {
    let (socket, _) = connect_async(format!("ws://127.0.0.1:{port}{path}"))
        .await
        .unwrap();
    socket
}

async fn next_message(client: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(1), client.next())
        .await
        .expect("no message within deadline")
        .expect("stream ended")
        .expect("socket error")
}

#[tokio::test]
async fn test_host_without_plugin_is_closed_not_ready() {
    let port = start_bridge().await;
    let mut host = connect(port, "/host/p1").await;

    match next_message(&mut host).await {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 1000);
            assert_eq!(frame.reason, PLUGIN_NOT_READY);
        }
        other => panic!("expected close, got {:?}", other),
    }
}

#[tokio::test]
async fn test_frames_forward_with_newline_normalization() {
    let port = start_bridge().await;
    let mut plugin = connect(port, "/plugins/p1").await;
    let mut host = connect(port, "/host/p1").await;

    // Sent without the delimiter, received with it.
    plugin.send(Message::Text("hello".to_string())).await.unwrap();
    assert_eq!(next_message(&mut host).await, Message::Text("hello\n".to_string()));

    // Already-delimited frames pass through unchanged.
    host.send(Message::Text("{\"id\":1}\n".to_string())).await.unwrap();
    assert_eq!(
        next_message(&mut plugin).await,
        Message::Text("{\"id\":1}\n".to_string())
    );
}

#[tokio::test]
async fn test_second_host_replaces_first() {
    let port = start_bridge().await;
    let mut plugin = connect(port, "/plugins/p1").await;
    let mut first = connect(port, "/host/p1").await;
    let mut second = connect(port, "/host/p1").await;

    match next_message(&mut first).await {
        Message::Close(Some(frame)) => assert_eq!(frame.reason, REPLACED),
        other => panic!("expected close, got {:?}", other),
    }

    plugin.send(Message::Text("after\n".to_string())).await.unwrap();
    assert_eq!(next_message(&mut second).await, Message::Text("after\n".to_string()));
}

#[tokio::test]
async fn test_host_can_reconnect_after_plugin_returns() {
    let port = start_bridge().await;

    {
        let _plugin = connect(port, "/plugins/p1").await;
        // Plugin drops here; the session's plugin slot empties.
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // With the plugin gone, a host is rejected again.
    let mut rejected = connect(port, "/host/p1").await;
    match next_message(&mut rejected).await {
        Message::Close(Some(frame)) => assert_eq!(frame.reason, PLUGIN_NOT_READY),
        other => panic!("expected close, got {:?}", other),
    }

    // A fresh plugin makes the id pairable again.
    let mut plugin = connect(port, "/plugins/p1").await;
    let mut host = connect(port, "/host/p1").await;
    plugin.send(Message::Text("back\n".to_string())).await.unwrap();
    assert_eq!(next_message(&mut host).await, Message::Text("back\n".to_string()));
}
