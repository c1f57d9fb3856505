//! # Session registry
//!
//! Pairs at most one plugin and one host connection per plugin id.
//! All pairing and replacement decisions happen under one write lock,
//! so they are atomic per plugin id. Each endpoint slot carries a
//! generation number; a disconnecting socket only clears the slot if
//! it still owns it, so a replaced connection's teardown never evicts
//! its replacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

/// Close reason sent to a host that connected before its plugin.
pub const PLUGIN_NOT_READY: &str = "Plugin not ready";

/// Close reason sent to a connection displaced by a newer one.
pub const REPLACED: &str = "Replaced by new connection";

/// Which end of a session a socket is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Plugin,
    Host,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Plugin => "plugin",
            Role::Host => "host",
        }
    }
}

/// Message handed to an endpoint's writer task.
#[derive(Debug)]
pub enum Outbound {
    Frame(String),
    Close(&'static str),
}

pub struct EndpointHandle {
    pub tx: mpsc::UnboundedSender<Outbound>,
    pub generation: u64,
}

#[derive(Default)]
struct Session {
    plugin: Option<EndpointHandle>,
    host: Option<EndpointHandle>,
}

impl Session {
    fn slot(&mut self, role: Role) -> &mut Option<EndpointHandle> {
        match role {
            Role::Plugin => &mut self.plugin,
            Role::Host => &mut self.host,
        }
    }

    fn is_empty(&self) -> bool {
        self.plugin.is_none() && self.host.is_none()
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    next_generation: AtomicU64,
}

/// Outcome of attaching an endpoint.
pub enum Attach {
    /// The endpoint now owns its slot; this generation identifies it.
    Accepted { generation: u64 },
    /// No plugin is present for the host to pair with.
    Rejected(&'static str),
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection to its slot. A plugin creates the session
    /// if none exists; a host requires a plugin to be present already.
    /// Either role displaces a previous occupant of the same slot,
    /// which is told why.
    pub async fn attach(
        &self,
        plugin_id: &str,
        role: Role,
        tx: mpsc::UnboundedSender<Outbound>,
    ) -> Attach {
        let mut sessions = self.sessions.write().await;

        if role == Role::Host && sessions.get(plugin_id).map_or(true, |s| s.plugin.is_none()) {
            return Attach::Rejected(PLUGIN_NOT_READY);
        }

        let session = sessions.entry(plugin_id.to_string()).or_default();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = session.slot(role).replace(EndpointHandle { tx, generation }) {
            tracing::info!("{} for {} replaced by new connection", role.as_str(), plugin_id);
            let _ = previous.tx.send(Outbound::Close(REPLACED));
        }
        Attach::Accepted { generation }
    }

    /// Detach a connection. Only clears the slot if the given
    /// generation still owns it; the session entry is deleted once
    /// both slots are empty.
    pub async fn detach(&self, plugin_id: &str, role: Role, generation: u64) {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(plugin_id) else {
            return;
        };
        let slot = session.slot(role);
        if slot.as_ref().is_some_and(|h| h.generation == generation) {
            *slot = None;
        }
        if session.is_empty() {
            sessions.remove(plugin_id);
        }
    }

    /// Forward a frame to the opposite end of the session. Returns
    /// false when no peer is connected (the frame is dropped).
    pub async fn forward(&self, plugin_id: &str, from: Role, frame: String) -> bool {
        let sessions = self.sessions.read().await;
        let peer = sessions.get(plugin_id).and_then(|s| match from {
            Role::Plugin => s.host.as_ref(),
            Role::Host => s.plugin.as_ref(),
        });
        match peer {
            Some(handle) => handle.tx.send(Outbound::Frame(frame)).is_ok(),
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Frames are newline-delimited on both sides; a payload arriving
/// without its terminator gets one appended.
pub fn normalize_frame(mut frame: String) -> String {
    if !frame.ends_with('\n') {
        frame.push('\n');
    }
    frame
}
