//! Error taxonomy for the RPC layer
//!
//! Transport failures are retried by reconnecting at the client;
//! protocol failures are reported and never crash the channel; a
//! timeout rejects only the specific pending call.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// Socket-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed frame or otherwise unparseable payload.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No response within the configured deadline.
    #[error("Request timed out")]
    Timeout,

    /// Channel is not connected; set on calls made after disconnect
    /// and on pending calls swept by a disconnect.
    #[error("Not connected")]
    NotConnected,

    /// The peer exposed no such method.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// The peer's handler returned an error.
    #[error("Remote error: {0}")]
    Remote(String),

    /// An application callback failed while servicing a request.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Argument decoding failed on the receiving side.
    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArgs { method: String, reason: String },
}

pub type RpcResult<T> = Result<T, RpcError>;
