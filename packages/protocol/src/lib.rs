//! # Uniview Protocol
//!
//! Shared wire types for the plugin–host synchronization protocol.
//!
//! A plugin renders an abstract UI tree; the host materializes a
//! replica of that tree and renders it with whatever native facilities
//! it has. This crate defines everything both sides must agree on:
//!
//! - [`UiNode`] — the serializable UI tree
//! - [`Mutation`] — the vocabulary of structural changes
//! - handler-id prop conventions for event callbacks crossing the
//!   boundary ([`events`])
//! - the [`RpcMessage`] envelope and typed request payloads
//!
//! Pure data: no I/O, no behavior beyond equality and traversal
//! helpers.

mod events;
mod mutations;
mod rpc;
mod tree;

pub use events::{extract_event_name, handler_id_prop, is_event_prop, is_handler_id_prop, HandlerId};
pub use mutations::{Mutation, MutationBatch};
pub use rpc::{
    methods, ErrorReport, InitializeRequest, LogLevel, MessageKind, RpcMessage, PROTOCOL_VERSION,
};
pub use tree::{is_layout_tag, Props, UiChild, UiNode, LAYOUT_TAGS, TEXT_NODE_TYPE, TEXT_PROP};
