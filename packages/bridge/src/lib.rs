//! # Uniview Bridge
//!
//! Rendezvous relay for plugins and hosts that live in different
//! processes. A plugin connects to `/plugins/:plugin_id`, a host to
//! `/host/:plugin_id`; the bridge pairs them by id and forwards
//! newline-delimited frames byte-for-byte in both directions. It
//! never interprets the protocol it carries.

mod server;
mod session;

pub use server::app;
pub use session::{
    normalize_frame, Attach, Outbound, Role, SessionRegistry, PLUGIN_NOT_READY, REPLACED,
};
