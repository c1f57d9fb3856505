//! WebSocket client transport
//!
//! Connects one endpoint (plugin or host) to the relay bridge. Each
//! WebSocket text message carries exactly one newline-terminated
//! frame; the trailing newline is stripped before the frame reaches
//! the channel and re-appended on send.

use crate::error::{RpcError, RpcResult};
use crate::transport::Transport;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Inbound frame buffer between the socket reader task and the
/// channel's read loop.
const FRAME_CAPACITY: usize = 64;

/// Transport half of a client WebSocket connection.
pub struct WsTransport {
    tx: mpsc::UnboundedSender<WsCommand>,
}

enum WsCommand {
    Frame(String),
    Close,
}

/// Connect to `url` (e.g. `ws://localhost:3000/plugins/p1`) and return
/// the transport plus the inbound frame stream.
///
/// Two background tasks own the socket halves: a writer draining the
/// command queue and a reader forwarding text frames. When either half
/// fails the frame stream ends, which the channel treats as a
/// disconnect.
pub async fn connect(url: &str) -> RpcResult<(WsTransport, mpsc::Receiver<String>)> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(|e| RpcError::Transport(e.to_string()))?;
    let (mut sink, mut stream) = socket.split();

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
    let (frame_tx, frame_rx) = mpsc::channel(FRAME_CAPACITY);

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                WsCommand::Frame(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        tracing::warn!("websocket send failed: {}", e);
                        break;
                    }
                }
                WsCommand::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let frame = text.strip_suffix('\n').unwrap_or(&text).to_string();
                    if frame_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                // Pings are answered by tungstenite itself.
                Ok(_) => {}
            }
        }
        // Dropping frame_tx ends the channel's read loop.
    });

    Ok((WsTransport { tx: cmd_tx }, frame_rx))
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, mut frame: String) -> RpcResult<()> {
        if !frame.ends_with('\n') {
            frame.push('\n');
        }
        self.tx
            .send(WsCommand::Frame(frame))
            .map_err(|_| RpcError::NotConnected)
    }

    async fn close(&self) {
        let _ = self.tx.send(WsCommand::Close);
    }
}
