//! # Render root
//!
//! The producer-side committed tree plus the commit notification API a
//! rendering front-end drives. Each notification mutates the committed
//! tree and records the matching mutation in lock-step, so the flushed
//! batch replays in exactly the order the changes were made.
//!
//! A commit is the span from [`RenderRoot::on_commit_start`] to
//! [`RenderRoot::commit`]; the producer pipeline is single-threaded,
//! so a span never interleaves with another.

use crate::collector::MutationCollector;
use crate::element::{Element, ElementChild, ElementProps};
use crate::handlers::HandlerRegistry;
use crate::serialize::serialize_tree;
use uniview_protocol::{MutationBatch, UiNode};

#[derive(Default)]
pub struct RenderRoot {
    root: Option<Element>,
    collector: MutationCollector,
}

impl RenderRoot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Begin a commit span.
    pub fn on_commit_start(&mut self) {
        self.collector.begin_commit();
    }

    /// A node was mounted. `parent_id: None` replaces the root.
    pub fn on_node_created(
        &mut self,
        parent_id: Option<&str>,
        element: Element,
        index: usize,
        registry: &mut HandlerRegistry,
    ) {
        self.collector
            .collect_create(parent_id, &element, index, registry);
        match parent_id {
            None => self.root = Some(element),
            Some(parent_id) => {
                if let Some(parent) = self.root.as_mut().and_then(|r| r.find_mut(parent_id)) {
                    let index = index.min(parent.children.len());
                    parent.children.insert(index, ElementChild::Node(element));
                } else {
                    tracing::warn!("create under unknown parent {}", parent_id);
                }
            }
        }
    }

    /// A text child was mounted under an existing node.
    pub fn on_text_created(&mut self, parent_id: &str, text_id: &str, text: &str, index: usize) {
        if let Some(parent) = self.root.as_mut().and_then(|r| r.find_mut(parent_id)) {
            let index = index.min(parent.children.len());
            parent.children.insert(
                index,
                ElementChild::Text {
                    id: text_id.to_string(),
                    text: text.to_string(),
                },
            );
            self.collector
                .collect_text_create(parent_id, text_id, text, index);
        } else {
            tracing::warn!("text create under unknown parent {}", parent_id);
        }
    }

    /// A child (node or text) was unmounted.
    pub fn on_node_removed(
        &mut self,
        parent_id: &str,
        child_id: &str,
        registry: &mut HandlerRegistry,
    ) {
        let Some(parent) = self.root.as_mut().and_then(|r| r.find_mut(parent_id)) else {
            tracing::warn!("remove under unknown parent {}", parent_id);
            return;
        };
        let Some(position) = parent.children.iter().position(|c| c.id() == child_id) else {
            tracing::warn!("remove of unknown child {} under {}", child_id, parent_id);
            return;
        };
        let removed = parent.children.remove(position);
        self.collector.collect_remove(parent_id, &removed, registry);
    }

    /// A node's props were replaced. Emits a per-key diff.
    pub fn on_props_changed(
        &mut self,
        node_id: &str,
        new_props: ElementProps,
        registry: &mut HandlerRegistry,
    ) {
        let Some(node) = self.root.as_mut().and_then(|r| r.find_mut(node_id)) else {
            tracing::warn!("props change on unknown node {}", node_id);
            return;
        };
        let old = std::mem::replace(&mut node.props, new_props.clone());
        self.collector
            .collect_set_props(node_id, &old, &new_props, registry);
    }

    /// A text child's content changed.
    pub fn on_text_changed(&mut self, text_id: &str, text: &str) {
        if let Some(slot) = self.root.as_mut().and_then(|r| find_text_mut(r, text_id)) {
            *slot = text.to_string();
            self.collector.collect_set_text(text_id, text);
        } else {
            tracing::warn!("text change on unknown text child {}", text_id);
        }
    }

    /// A node's children were reordered.
    pub fn on_children_reordered(&mut self, parent_id: &str, child_ids: Vec<String>) {
        let Some(parent) = self.root.as_mut().and_then(|r| r.find_mut(parent_id)) else {
            tracing::warn!("reorder under unknown parent {}", parent_id);
            return;
        };
        let mut remaining = std::mem::take(&mut parent.children);
        let mut ordered = Vec::with_capacity(remaining.len());
        for id in &child_ids {
            if let Some(position) = remaining.iter().position(|c| c.id() == id) {
                ordered.push(remaining.remove(position));
            }
        }
        // Children omitted from the new order keep their relative
        // order at the end.
        ordered.append(&mut remaining);
        parent.children = ordered;
        self.collector.collect_reorder(parent_id, child_ids);
    }

    /// End the commit span, returning the recorded batch.
    pub fn commit(&mut self) -> MutationBatch {
        self.collector.flush_commit()
    }

    /// Replace the whole committed tree and serialize it. Used for
    /// initialize and full re-renders; any pending batch is discarded
    /// since the full tree supersedes it.
    pub fn replace(&mut self, element: Element, registry: &mut HandlerRegistry) -> UiNode {
        self.collector.begin_commit();
        let node = serialize_tree(&element, registry, self.collector.bindings_mut());
        self.root = Some(element);
        node
    }

    /// Re-serialize the committed tree without replacing it. Recovery
    /// path for `syncTree`.
    pub fn snapshot(&mut self, registry: &mut HandlerRegistry) -> Option<UiNode> {
        let root = self.root.clone()?;
        Some(serialize_tree(&root, registry, self.collector.bindings_mut()))
    }

    /// Drop the committed tree and all collector state.
    pub fn reset(&mut self) {
        self.root = None;
        self.collector.reset();
    }
}

fn find_text_mut<'a>(element: &'a mut Element, text_id: &str) -> Option<&'a mut String> {
    for child in &mut element.children {
        match child {
            ElementChild::Text { id, text } if id == text_id => return Some(text),
            ElementChild::Text { .. } => {}
            ElementChild::Node(node) => {
                if let Some(found) = find_text_mut(node, text_id) {
                    return Some(found);
                }
            }
        }
    }
    None
}
