//! # Uniview RPC
//!
//! The message-framed request/response layer connecting a plugin to a
//! host. Frames are newline-terminated JSON
//! [`RpcMessage`](uniview_protocol::RpcMessage) envelopes; transports
//! move frames, the [`RpcChannel`] correlates requests with responses
//! and dispatches inbound requests to an [`RpcService`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ RpcChannel: ids, pending table, timeouts     │
//! └──────────────────────────────────────────────┘
//!                      ↓
//! ┌──────────────────────────────────────────────┐
//! │ Transport: duplex pair (in-process)          │
//! │            WebSocket client (via the bridge) │
//! └──────────────────────────────────────────────┘
//! ```

mod channel;
mod error;
mod transport;
mod ws;

pub use channel::{ConnectionState, RpcChannel, RpcService, DEFAULT_REQUEST_TIMEOUT};
pub use error::{RpcError, RpcResult};
pub use transport::{duplex_pair, DuplexTransport, Transport};
pub use ws::{connect, WsTransport};
