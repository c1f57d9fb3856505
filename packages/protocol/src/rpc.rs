//! RPC message envelope and method surface
//!
//! Each wire frame is one newline-terminated JSON-encoded
//! [`RpcMessage`]. Requests carry a fresh id; the matching response
//! echoes it. Notifications are requests whose response nobody awaits.
//!
//! The complete method surface between plugin and host:
//!
//! - plugin-exposed (invoked by the host): `initialize`,
//!   `updateProps`, `executeHandler`, `destroy`, `syncTree`
//! - host-exposed (invoked by the plugin): `updateTree`,
//!   `applyMutations`, `log`, `reportError`

use serde::{Deserialize, Serialize};

/// Protocol version negotiated during `initialize`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Wire method names.
pub mod methods {
    // Plugin-exposed
    pub const INITIALIZE: &str = "initialize";
    pub const UPDATE_PROPS: &str = "updateProps";
    pub const EXECUTE_HANDLER: &str = "executeHandler";
    pub const DESTROY: &str = "destroy";
    pub const SYNC_TREE: &str = "syncTree";

    // Host-exposed
    pub const UPDATE_TREE: &str = "updateTree";
    pub const APPLY_MUTATIONS: &str = "applyMutations";
    pub const LOG: &str = "log";
    pub const REPORT_ERROR: &str = "reportError";
}

/// Whether a message initiates a call or answers one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Request,
    Response,
}

/// The envelope carried by every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcMessage {
    pub id: u64,
    pub kind: MessageKind,

    /// Set on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Positional arguments, set on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<serde_json::Value>>,

    /// Set on successful responses. An absent field and an explicit
    /// JSON `null` mean the same thing, so null results are kept off
    /// the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Set on failed responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcMessage {
    pub fn request(id: u64, method: &str, args: Vec<serde_json::Value>) -> Self {
        Self {
            id,
            kind: MessageKind::Request,
            method: Some(method.to_string()),
            args: Some(args),
            result: None,
            error: None,
        }
    }

    pub fn response(id: u64, result: serde_json::Value) -> Self {
        // `Option<Value>` deserializes JSON null as `None`, so a
        // `Some(Value::Null)` would not survive a round trip. Null
        // results are canonicalized to the absent form.
        let result = if result.is_null() { None } else { Some(result) };
        Self {
            id,
            kind: MessageKind::Response,
            method: None,
            args: None,
            result,
            error: None,
        }
    }

    pub fn error_response(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            kind: MessageKind::Response,
            method: None,
            args: None,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Payload of the `initialize` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub protocol_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<serde_json::Value>,
}

/// Severity carried by `log` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// Payload of the `reportError` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}
