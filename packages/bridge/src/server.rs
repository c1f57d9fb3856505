//! # Relay server
//!
//! WebSocket endpoints pairing plugins with hosts, plus static serving
//! of plugin bundles. Forwarding is content-transparent: the relay
//! never parses a frame, it only normalizes the newline delimiter.

use crate::session::{
    normalize_frame, Attach, Outbound, Role, SessionRegistry,
};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Build the relay application. `bundle_dir` enables static serving
/// of plugin bundles under `/bundles` with permissive CORS, so hosts
/// on other origins can fetch them.
pub fn app(registry: Arc<SessionRegistry>, bundle_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/plugins/:plugin_id", get(plugin_ws))
        .route("/host/:plugin_id", get(host_ws))
        .with_state(registry);

    match bundle_dir {
        Some(dir) => router
            .nest_service("/bundles", ServeDir::new(dir))
            .layer(CorsLayer::permissive()),
        None => router,
    }
}

async fn plugin_ws(
    Path(plugin_id): Path<String>,
    State(registry): State<Arc<SessionRegistry>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_endpoint(registry, plugin_id, Role::Plugin, socket))
}

async fn host_ws(
    Path(plugin_id): Path<String>,
    State(registry): State<Arc<SessionRegistry>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_endpoint(registry, plugin_id, Role::Host, socket))
}

async fn run_endpoint(
    registry: Arc<SessionRegistry>,
    plugin_id: String,
    role: Role,
    socket: WebSocket,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let generation = match registry.attach(&plugin_id, role, tx).await {
        Attach::Accepted { generation } => generation,
        Attach::Rejected(reason) => {
            tracing::info!("{} rejected for {}: {}", role.as_str(), plugin_id, reason);
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
    };
    tracing::info!("{} connected for {}", role.as_str(), plugin_id);

    // Writer: drains the slot's queue onto the socket. Ends when the
    // slot is cleared (sender dropped) or a close is requested.
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(frame) => {
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(reason) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::NORMAL,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    // Reader: forwards every inbound frame to the peer slot.
    while let Some(message) = stream.next().await {
        let frame = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!("dropping non-utf8 binary frame from {}", role.as_str());
                    continue;
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        if !registry
            .forward(&plugin_id, role, normalize_frame(frame))
            .await
        {
            tracing::debug!("no peer for {}, frame dropped", plugin_id);
        }
    }

    tracing::info!("{} disconnected for {}", role.as_str(), plugin_id);
    registry.detach(&plugin_id, role, generation).await;
    writer.abort();
}
