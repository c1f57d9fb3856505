//! Request/response channel
//!
//! One [`RpcChannel`] wraps one transport. Outgoing requests get a
//! fresh id and park a continuation in the pending table; the read
//! loop completes them when the matching response frame arrives.
//! Every pending call has exactly one always-resolving cancellation
//! path: the per-call timeout or the disconnect sweep.
//!
//! Inbound requests are dispatched to the [`RpcService`] strictly in
//! arrival order on a dedicated task behind an unbounded queue, so a
//! slow handler never stalls response routing (a handler may itself
//! issue calls on the same channel).

use crate::error::{RpcError, RpcResult};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uniview_protocol::{MessageKind, RpcMessage};

/// Default deadline for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of one endpoint's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The `initialize` round-trip has succeeded.
    Initialized,
}

/// Methods an endpoint exposes to its peer.
#[async_trait]
pub trait RpcService: Send + Sync {
    async fn handle(&self, method: &str, args: Vec<serde_json::Value>)
        -> RpcResult<serde_json::Value>;
}

type PendingTable = Mutex<HashMap<u64, oneshot::Sender<RpcResult<serde_json::Value>>>>;

impl std::fmt::Debug for RpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChannel").finish_non_exhaustive()
    }
}

pub struct RpcChannel {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingTable>,
    next_id: AtomicU64,
    timeout: Duration,
    state: Arc<Mutex<ConnectionState>>,
}

impl RpcChannel {
    /// Wrap a connected transport and start the read loop. `frames` is
    /// the inbound side of the same transport; when it ends the
    /// channel transitions to `Disconnected` and sweeps all pending
    /// requests.
    pub fn spawn(
        transport: impl Transport + 'static,
        frames: mpsc::Receiver<String>,
        service: Arc<dyn RpcService>,
    ) -> Arc<Self> {
        Self::spawn_with_timeout(transport, frames, service, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn spawn_with_timeout(
        transport: impl Transport + 'static,
        frames: mpsc::Receiver<String>,
        service: Arc<dyn RpcService>,
        timeout: Duration,
    ) -> Arc<Self> {
        let state = Arc::new(Mutex::new(ConnectionState::Connected));
        Self::spawn_inner(Arc::new(transport), frames, service, timeout, state)
    }

    /// Dial a relay endpoint (e.g. `ws://localhost:3000/plugins/p1`)
    /// and wrap the socket in a channel. The channel state moves
    /// through `Connecting` while the dial is in flight; a failed dial
    /// surfaces as [`RpcError::Transport`].
    pub async fn connect_ws(url: &str, service: Arc<dyn RpcService>) -> RpcResult<Arc<Self>> {
        Self::connect_ws_with_timeout(url, service, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_ws_with_timeout(
        url: &str,
        service: Arc<dyn RpcService>,
        timeout: Duration,
    ) -> RpcResult<Arc<Self>> {
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let (transport, frames) = match crate::ws::connect(url).await {
            Ok(pair) => pair,
            Err(e) => {
                *state.lock().unwrap() = ConnectionState::Disconnected;
                return Err(e);
            }
        };
        *state.lock().unwrap() = ConnectionState::Connected;
        Ok(Self::spawn_inner(Arc::new(transport), frames, service, timeout, state))
    }

    fn spawn_inner(
        transport: Arc<dyn Transport>,
        frames: mpsc::Receiver<String>,
        service: Arc<dyn RpcService>,
        timeout: Duration,
        state: Arc<Mutex<ConnectionState>>,
    ) -> Arc<Self> {
        let channel = Arc::new(Self {
            transport,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            timeout,
            state,
        });
        channel.clone().start_read_loop(frames, service);
        channel
    }

    /// Call a method on the peer and await its response.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> RpcResult<serde_json::Value> {
        if self.state() == ConnectionState::Disconnected {
            return Err(RpcError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let frame = encode(&RpcMessage::request(id, method, args))?;
        if let Err(e) = self.transport.send(frame).await {
            self.pending.lock().unwrap().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            // Deadline passed: remove the entry so a late response is
            // ignored rather than resolving a stale continuation.
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                Err(RpcError::Timeout)
            }
            // Sender dropped by the disconnect sweep.
            Ok(Err(_)) => Err(RpcError::NotConnected),
            Ok(Ok(result)) => result,
        }
    }

    /// Fire-and-forget call: the response, if any, is discarded.
    pub async fn notify(&self, method: &str, args: Vec<serde_json::Value>) -> RpcResult<()> {
        if self.state() == ConnectionState::Disconnected {
            return Err(RpcError::NotConnected);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = encode(&RpcMessage::request(id, method, args))?;
        self.transport.send(frame).await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Mark the `initialize` round-trip as complete.
    pub fn set_initialized(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Initialized;
        }
    }

    /// Number of in-flight requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Close the transport. The read loop observes end-of-stream and
    /// sweeps pending requests.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    fn start_read_loop(self: Arc<Self>, mut frames: mpsc::Receiver<String>, service: Arc<dyn RpcService>) {
        // Requests are handled sequentially off the read loop so that
        // response frames keep flowing while a handler runs. The queue
        // is unbounded: the read loop must never block on a backlog of
        // requests, or a handler awaiting its own outbound call would
        // deadlock the channel.
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel::<RpcMessage>();
        let dispatch_transport = self.transport.clone();
        tokio::spawn(async move {
            while let Some(request) = dispatch_rx.recv().await {
                let id = request.id;
                let method = request.method.unwrap_or_default();
                let args = request.args.unwrap_or_default();
                let response = match service.handle(&method, args).await {
                    Ok(result) => RpcMessage::response(id, result),
                    Err(e) => RpcMessage::error_response(id, e.to_string()),
                };
                let frame = match encode(&response) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!("failed to encode response: {}", e);
                        continue;
                    }
                };
                if dispatch_transport.send(frame).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let message: RpcMessage = match serde_json::from_str(frame.trim_end()) {
                    Ok(message) => message,
                    Err(e) => {
                        // ProtocolError: report and keep reading.
                        tracing::warn!("dropping malformed frame: {}", e);
                        continue;
                    }
                };
                match message.kind {
                    MessageKind::Request => {
                        if dispatch_tx.send(message).is_err() {
                            break;
                        }
                    }
                    MessageKind::Response => self.complete(message),
                }
            }

            // Transport gone: reject every in-flight call so no caller
            // stalls forever.
            *self.state.lock().unwrap() = ConnectionState::Disconnected;
            let swept: Vec<_> = self.pending.lock().unwrap().drain().collect();
            for (_, tx) in swept {
                let _ = tx.send(Err(RpcError::NotConnected));
            }
        });
    }

    fn complete(&self, message: RpcMessage) {
        let Some(tx) = self.pending.lock().unwrap().remove(&message.id) else {
            // Timed out, notification, or duplicate: ignore.
            tracing::trace!("ignoring response for unknown request {}", message.id);
            return;
        };
        let result = match message.error {
            Some(error) => Err(RpcError::Remote(error)),
            None => Ok(message.result.unwrap_or(serde_json::Value::Null)),
        };
        let _ = tx.send(result);
    }
}

fn encode(message: &RpcMessage) -> RpcResult<String> {
    serde_json::to_string(message).map_err(|e| RpcError::Protocol(e.to_string()))
}
