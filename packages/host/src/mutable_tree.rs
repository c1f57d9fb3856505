//! # Mutable tree replica
//!
//! The host-side copy of the plugin's UI tree. Holds an immutable,
//! `Arc`-linked node structure: every mutating operation copies the
//! path from the touched node up to the root and leaves every other
//! subtree's `Arc` identity untouched, so observers holding a previous
//! root reference see no change while holders of the current root do.
//!
//! ## Failure semantics
//!
//! A mutation referencing an unknown node or parent id is dropped (one
//! warning logged) and the rest of the batch continues. The caller
//! learns how many were dropped via [`ApplyOutcome`] and can request a
//! full re-sync — a single bad mutation must not corrupt the replica.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uniview_protocol::{Mutation, MutationBatch, Props, UiChild, UiNode, TEXT_NODE_TYPE, TEXT_PROP};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("parent not found: {0}")]
    ParentNotFound(String),

    #[error("node {0} is not a text child")]
    NotAText(String),

    #[error("replica has no root")]
    NoRoot,
}

/// A node in the replica. Children link through `Arc` so unchanged
/// subtrees keep their identity across mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaNode {
    pub id: String,
    pub node_type: String,
    pub props: Props,
    pub children: Vec<ReplicaChild>,
}

/// A child slot. Text slots created by mutations carry the id the
/// producer assigned; text arriving inside a full tree is anonymous
/// (the wire format inlines it as a bare string) and can only be
/// replaced via its parent.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicaChild {
    Node(Arc<ReplicaNode>),
    Text { id: Option<String>, text: String },
}

impl ReplicaNode {
    /// Deep-convert to the wire tree. Text ids are dropped; the wire
    /// format inlines text children as bare strings.
    pub fn to_ui_node(&self) -> UiNode {
        UiNode {
            id: self.id.clone(),
            node_type: self.node_type.clone(),
            props: self.props.clone(),
            children: self
                .children
                .iter()
                .map(|child| match child {
                    ReplicaChild::Node(node) => UiChild::Node(node.to_ui_node()),
                    ReplicaChild::Text { text, .. } => UiChild::Text(text.clone()),
                })
                .collect(),
        }
    }
}

/// What `apply` did with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub dropped: usize,
}

impl ApplyOutcome {
    /// True when the replica may have diverged from the producer and a
    /// full re-sync should be requested.
    pub fn needs_resync(&self) -> bool {
        self.dropped > 0
    }
}

/// Change notifications delivered to subscribers.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// The whole tree was replaced (`init`).
    Replaced(Option<Arc<ReplicaNode>>),
    /// A mutation batch was applied.
    MutationsApplied(Arc<ReplicaNode>),
}

#[derive(Default)]
pub struct MutableTree {
    root: Option<Arc<ReplicaNode>>,
    /// child id -> parent id, for every addressable node and text slot.
    parents: HashMap<String, String>,
    subscribers: Vec<mpsc::UnboundedSender<TreeEvent>>,
}

impl MutableTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<Arc<ReplicaNode>> {
        self.root.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.root.as_deref().is_some_and(|r| r.id == id) || self.parents.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        fn count(node: &ReplicaNode) -> usize {
            1 + node
                .children
                .iter()
                .map(|c| match c {
                    ReplicaChild::Node(n) => count(n),
                    ReplicaChild::Text { .. } => 0,
                })
                .sum::<usize>()
        }
        self.root.as_deref().map_or(0, count)
    }

    /// Fetch a node by id, sharing the replica's `Arc`.
    pub fn get(&self, id: &str) -> Option<Arc<ReplicaNode>> {
        let path = self.path_to(id)?;
        let mut current = self.root.clone()?;
        for step in &path {
            let next = current.children.iter().find_map(|c| match c {
                ReplicaChild::Node(n) if n.id == *step => Some(n.clone()),
                _ => None,
            })?;
            current = next;
        }
        Some(current)
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TreeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Replace the whole replica with a full tree (or clear it).
    pub fn init(&mut self, tree: Option<&UiNode>) {
        self.parents.clear();
        self.root = tree.map(|node| {
            let replica = Arc::new(from_ui_node(node));
            index_subtree(&replica, &mut self.parents);
            replica
        });
        let event = TreeEvent::Replaced(self.root.clone());
        self.broadcast(event);
    }

    /// Apply a batch in order. Invalid mutations are dropped and
    /// counted; the root is a fresh `Arc` afterwards even for an empty
    /// batch, so reference-identity observers always see a change.
    pub fn apply(&mut self, batch: &MutationBatch) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        for mutation in batch {
            match self.apply_one(mutation) {
                Ok(()) => outcome.applied += 1,
                Err(e) => {
                    tracing::warn!("dropping mutation on {}: {}", mutation.target_id(), e);
                    outcome.dropped += 1;
                }
            }
        }
        if let Some(root) = &self.root {
            self.root = Some(Arc::new(ReplicaNode::clone(root)));
        }
        if let Some(root) = self.root.clone() {
            self.broadcast(TreeEvent::MutationsApplied(root));
        }
        outcome
    }

    fn apply_one(&mut self, mutation: &Mutation) -> Result<(), MutationError> {
        match mutation {
            Mutation::Create {
                node_id,
                node_type,
                parent_id,
                index,
                props,
            } => self.create(node_id, node_type, parent_id.as_deref(), *index, props),
            Mutation::Remove { node_id, parent_id } => self.remove(node_id, parent_id),
            Mutation::SetProp { node_id, key, value } => {
                self.edit_node(node_id, |node| {
                    node.props.insert(key.clone(), value.clone());
                })
            }
            Mutation::RemoveProp { node_id, key } => {
                self.edit_node(node_id, |node| {
                    node.props.remove(key);
                })
            }
            Mutation::SetText { node_id, text } => self.set_text(node_id, text),
            Mutation::Reorder {
                parent_id,
                child_ids,
            } => self.reorder(parent_id, child_ids),
        }
    }

    fn create(
        &mut self,
        node_id: &str,
        node_type: &str,
        parent_id: Option<&str>,
        index: usize,
        props: &Option<Props>,
    ) -> Result<(), MutationError> {
        let props = props.clone().unwrap_or_default();

        let Some(parent_id) = parent_id else {
            // Null parent replaces the root outright.
            self.parents.clear();
            let replica = Arc::new(ReplicaNode {
                id: node_id.to_string(),
                node_type: node_type.to_string(),
                props,
                children: Vec::new(),
            });
            self.root = Some(replica);
            return Ok(());
        };

        let child = if node_type == TEXT_NODE_TYPE {
            let text = props
                .get(TEXT_PROP)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            ReplicaChild::Text {
                id: Some(node_id.to_string()),
                text,
            }
        } else {
            ReplicaChild::Node(Arc::new(ReplicaNode {
                id: node_id.to_string(),
                node_type: node_type.to_string(),
                props,
                children: Vec::new(),
            }))
        };

        self.edit_node(parent_id, |parent| {
            let index = index.min(parent.children.len());
            parent.children.insert(index, child);
        })
        .map_err(|_| MutationError::ParentNotFound(parent_id.to_string()))?;
        self.parents
            .insert(node_id.to_string(), parent_id.to_string());
        Ok(())
    }

    fn remove(&mut self, node_id: &str, parent_id: &str) -> Result<(), MutationError> {
        let mut removed: Option<ReplicaChild> = None;
        self.edit_node(parent_id, |parent| {
            if let Some(position) = parent
                .children
                .iter()
                .position(|c| child_id(c) == Some(node_id))
            {
                removed = Some(parent.children.remove(position));
            }
        })
        .map_err(|_| MutationError::ParentNotFound(parent_id.to_string()))?;

        let removed = removed.ok_or_else(|| MutationError::NodeNotFound(node_id.to_string()))?;
        self.unindex_child(&removed);
        Ok(())
    }

    fn set_text(&mut self, text_id: &str, text: &str) -> Result<(), MutationError> {
        let parent_id = self
            .parents
            .get(text_id)
            .cloned()
            .ok_or_else(|| MutationError::NodeNotFound(text_id.to_string()))?;
        let mut found = false;
        self.edit_node(&parent_id, |parent| {
            for child in &mut parent.children {
                if let ReplicaChild::Text { id: Some(id), text: slot } = child {
                    if id == text_id {
                        *slot = text.to_string();
                        found = true;
                        return;
                    }
                }
            }
        })?;
        if found {
            Ok(())
        } else {
            Err(MutationError::NotAText(text_id.to_string()))
        }
    }

    fn reorder(&mut self, parent_id: &str, child_ids: &[String]) -> Result<(), MutationError> {
        self.edit_node(parent_id, |parent| {
            let mut remaining = std::mem::take(&mut parent.children);
            let mut ordered = Vec::with_capacity(remaining.len());
            for id in child_ids {
                if let Some(position) = remaining
                    .iter()
                    .position(|c| child_id(c) == Some(id.as_str()))
                {
                    ordered.push(remaining.remove(position));
                }
            }
            // Omitted children keep their relative order at the end.
            ordered.append(&mut remaining);
            parent.children = ordered;
        })
        .map_err(|_| MutationError::ParentNotFound(parent_id.to_string()))
    }

    /// Copy-on-write edit of the node with the given id: every
    /// ancestor on the path to the root is re-allocated, siblings keep
    /// their `Arc` identity. Errors when the path does not land on a
    /// node (a stale index entry, or a step addressing a text slot) —
    /// the root is left untouched in that case.
    fn edit_node(
        &mut self,
        id: &str,
        edit: impl FnOnce(&mut ReplicaNode),
    ) -> Result<(), MutationError> {
        let path = self
            .path_to(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        let root = self.root.as_ref().ok_or(MutationError::NoRoot)?;
        let (rebuilt, edited) = rebuild(root, &path, edit);
        if !edited {
            return Err(MutationError::NodeNotFound(id.to_string()));
        }
        self.root = Some(rebuilt);
        Ok(())
    }

    /// Child-id path from (not including) the root down to `id`.
    /// Empty path addresses the root itself.
    fn path_to(&self, id: &str) -> Option<Vec<String>> {
        let root_id = self.root.as_deref().map(|r| r.id.clone())?;
        if id == root_id {
            return Some(Vec::new());
        }
        let mut path = vec![id.to_string()];
        let mut current = id;
        loop {
            let parent = self.parents.get(current)?;
            if *parent == root_id {
                path.reverse();
                return Some(path);
            }
            path.push(parent.clone());
            current = parent;
        }
    }

    fn unindex_child(&mut self, child: &ReplicaChild) {
        match child {
            ReplicaChild::Text { id: Some(id), .. } => {
                self.parents.remove(id);
            }
            ReplicaChild::Text { id: None, .. } => {}
            ReplicaChild::Node(node) => {
                self.parents.remove(&node.id);
                for child in &node.children {
                    self.unindex_child(child);
                }
            }
        }
    }

    fn broadcast(&mut self, event: TreeEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn child_id(child: &ReplicaChild) -> Option<&str> {
    match child {
        ReplicaChild::Node(node) => Some(&node.id),
        ReplicaChild::Text { id, .. } => id.as_deref(),
    }
}

fn from_ui_node(node: &UiNode) -> ReplicaNode {
    ReplicaNode {
        id: node.id.clone(),
        node_type: node.node_type.clone(),
        props: node.props.clone(),
        children: node
            .children
            .iter()
            .map(|child| match child {
                UiChild::Node(node) => ReplicaChild::Node(Arc::new(from_ui_node(node))),
                UiChild::Text(text) => ReplicaChild::Text {
                    id: None,
                    text: text.clone(),
                },
            })
            .collect(),
    }
}

fn index_subtree(node: &Arc<ReplicaNode>, parents: &mut HashMap<String, String>) {
    for child in &node.children {
        match child {
            ReplicaChild::Node(child_node) => {
                parents.insert(child_node.id.clone(), node.id.clone());
                index_subtree(child_node, parents);
            }
            ReplicaChild::Text { id: Some(id), .. } => {
                parents.insert(id.clone(), node.id.clone());
            }
            ReplicaChild::Text { id: None, .. } => {}
        }
    }
}

/// Returns the rebuilt subtree and whether `edit` actually ran. The
/// flag is false when a path step names a missing child or a text
/// slot instead of a node.
fn rebuild(
    node: &Arc<ReplicaNode>,
    path: &[String],
    edit: impl FnOnce(&mut ReplicaNode),
) -> (Arc<ReplicaNode>, bool) {
    let mut copy = ReplicaNode::clone(node);
    let edited = match path.split_first() {
        None => {
            edit(&mut copy);
            true
        }
        Some((next, rest)) => {
            let position = copy
                .children
                .iter()
                .position(|c| matches!(c, ReplicaChild::Node(n) if n.id == *next));
            match position {
                Some(position) => {
                    if let ReplicaChild::Node(child_node) = &mut copy.children[position] {
                        let (rebuilt, edited) = rebuild(child_node, rest, edit);
                        *child_node = rebuilt;
                        edited
                    } else {
                        false
                    }
                }
                None => false,
            }
        }
    };
    (Arc::new(copy), edited)
}
