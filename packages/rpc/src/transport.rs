//! Frame transport abstraction
//!
//! A transport moves newline-terminated text frames between two
//! endpoints. Outbound frames go through [`Transport::send`]; inbound
//! frames surface on the `mpsc::Receiver<String>` handed to the
//! channel alongside the transport. Closing the receiver is the
//! disconnect signal.

use crate::error::{RpcError, RpcResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Channel capacity for in-process transports.
const DUPLEX_CAPACITY: usize = 64;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame. Implementations append the trailing newline if
    /// the frame does not already carry one.
    async fn send(&self, frame: String) -> RpcResult<()>;

    /// Close the transport; the peer observes end-of-stream.
    async fn close(&self);
}

/// In-process transport half backed by tokio channels. Used by tests
/// and by hosts embedding the plugin in the same process.
pub struct DuplexTransport {
    tx: Arc<Mutex<Option<mpsc::Sender<String>>>>,
}

/// Create a connected pair of in-process transports. Frames sent on
/// one half arrive on the other half's receiver.
pub fn duplex_pair() -> (
    (DuplexTransport, mpsc::Receiver<String>),
    (DuplexTransport, mpsc::Receiver<String>),
) {
    let (a_tx, b_rx) = mpsc::channel(DUPLEX_CAPACITY);
    let (b_tx, a_rx) = mpsc::channel(DUPLEX_CAPACITY);
    (
        (DuplexTransport::new(a_tx), a_rx),
        (DuplexTransport::new(b_tx), b_rx),
    )
}

impl DuplexTransport {
    fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn send(&self, mut frame: String) -> RpcResult<()> {
        if !frame.ends_with('\n') {
            frame.push('\n');
        }
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or(RpcError::NotConnected)?;
        tx.send(frame)
            .await
            .map_err(|_| RpcError::Transport("peer closed".to_string()))
    }

    async fn close(&self) {
        // Dropping the sender closes the peer's receive stream.
        self.tx.lock().await.take();
    }
}
