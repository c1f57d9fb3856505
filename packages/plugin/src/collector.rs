//! # Mutation collector
//!
//! Records every structural, prop, and text change made during one
//! render commit as an ordered [`MutationBatch`]. Collecting at the
//! granularity of the tree-mutation primitives (rather than diffing
//! whole trees afterwards) keeps the cost at O(changes) and guarantees
//! the batch order matches actual application order, which host-side
//! replay depends on.
//!
//! A commit is bracketed by [`MutationCollector::begin_commit`] and
//! [`MutationCollector::flush_commit`]; the span is atomic — no
//! concurrent commit may interleave (the producer pipeline is
//! single-threaded).

use crate::element::{Element, ElementChild, ElementProps, PropValue};
use crate::handlers::HandlerRegistry;
use crate::serialize::{release_subtree, serialize_props, HandlerBindings};
use uniview_protocol::{
    handler_id_prop, is_event_prop, Mutation, MutationBatch, Props, TEXT_NODE_TYPE, TEXT_PROP,
};

#[derive(Default)]
pub struct MutationCollector {
    mutations: MutationBatch,
    bindings: HandlerBindings,
}

impl MutationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear any pending batch. Idempotent; must be called before any
    /// other collection call in a commit.
    pub fn begin_commit(&mut self) {
        self.mutations.clear();
    }

    /// Record the creation of a subtree: one `Create` per node,
    /// parents before children, nested handlers registered as the
    /// props are serialized.
    pub fn collect_create(
        &mut self,
        parent_id: Option<&str>,
        element: &Element,
        index: usize,
        registry: &mut HandlerRegistry,
    ) {
        let props = serialize_props(&element.id, &element.props, registry, &mut self.bindings);
        self.mutations.push(Mutation::Create {
            node_id: element.id.clone(),
            node_type: element.kind.clone(),
            parent_id: parent_id.map(str::to_string),
            index,
            props: (!props.is_empty()).then_some(props),
        });
        for (child_index, child) in element.children.iter().enumerate() {
            match child {
                ElementChild::Node(node) => {
                    self.collect_create(Some(&element.id), node, child_index, registry);
                }
                ElementChild::Text { id, text } => {
                    self.collect_text_create(&element.id, id, text, child_index);
                }
            }
        }
    }

    /// Record the creation of a bare text child.
    pub fn collect_text_create(
        &mut self,
        parent_id: &str,
        text_id: &str,
        text: &str,
        index: usize,
    ) {
        let mut props = Props::new();
        props.insert(TEXT_PROP.to_string(), serde_json::Value::String(text.to_string()));
        self.mutations.push(Mutation::Create {
            node_id: text_id.to_string(),
            node_type: TEXT_NODE_TYPE.to_string(),
            parent_id: Some(parent_id.to_string()),
            index,
            props: Some(props),
        });
    }

    /// Record the removal of a child. For node children, every handler
    /// owned by the removed subtree is unregistered — skipping this
    /// would leak handlers for the life of the session.
    pub fn collect_remove(
        &mut self,
        parent_id: &str,
        child: &ElementChild,
        registry: &mut HandlerRegistry,
    ) {
        if let ElementChild::Node(element) = child {
            release_subtree(element, registry, &mut self.bindings);
        }
        self.mutations.push(Mutation::Remove {
            node_id: child.id().to_string(),
            parent_id: parent_id.to_string(),
        });
    }

    /// Record a per-key prop diff between two prop maps.
    pub fn collect_set_props(
        &mut self,
        node_id: &str,
        old: &ElementProps,
        new: &ElementProps,
        registry: &mut HandlerRegistry,
    ) {
        for (key, new_value) in new {
            if old.get(key).is_some_and(|o| o.same_as(new_value)) {
                continue;
            }
            match new_value {
                PropValue::Handler(handler) if is_event_prop(key) => {
                    let id = registry.register(handler.clone());
                    let binding = (node_id.to_string(), key.clone());
                    if let Some(previous) = self.bindings.insert(binding, id.clone()) {
                        registry.remove(&previous);
                    }
                    self.mutations.push(Mutation::SetProp {
                        node_id: node_id.to_string(),
                        key: handler_id_prop(key),
                        value: serde_json::Value::String(id),
                    });
                }
                PropValue::Handler(_) => {}
                PropValue::Json(value) => {
                    self.mutations.push(Mutation::SetProp {
                        node_id: node_id.to_string(),
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        for (key, old_value) in old {
            if new.contains_key(key) {
                continue;
            }
            match old_value {
                PropValue::Handler(_) if is_event_prop(key) => {
                    let binding = (node_id.to_string(), key.clone());
                    if let Some(handler_id) = self.bindings.remove(&binding) {
                        registry.remove(&handler_id);
                    }
                    self.mutations.push(Mutation::RemoveProp {
                        node_id: node_id.to_string(),
                        key: handler_id_prop(key),
                    });
                }
                PropValue::Handler(_) => {}
                PropValue::Json(_) => {
                    self.mutations.push(Mutation::RemoveProp {
                        node_id: node_id.to_string(),
                        key: key.clone(),
                    });
                }
            }
        }
    }

    /// Record a text-content replacement.
    pub fn collect_set_text(&mut self, text_id: &str, text: &str) {
        self.mutations.push(Mutation::SetText {
            node_id: text_id.to_string(),
            text: text.to_string(),
        });
    }

    /// Record a child reorder.
    pub fn collect_reorder(&mut self, parent_id: &str, child_ids: Vec<String>) {
        self.mutations.push(Mutation::Reorder {
            parent_id: parent_id.to_string(),
            child_ids,
        });
    }

    /// Return the pending batch and clear it. Called exactly once per
    /// commit, after all collection calls for that commit.
    pub fn flush_commit(&mut self) -> MutationBatch {
        std::mem::take(&mut self.mutations)
    }

    pub fn pending(&self) -> usize {
        self.mutations.len()
    }

    pub(crate) fn bindings_mut(&mut self) -> &mut HandlerBindings {
        &mut self.bindings
    }

    /// Forget all bindings without touching the registry. Used when
    /// the whole session is torn down and the registry is cleared
    /// wholesale.
    pub fn reset(&mut self) {
        self.mutations.clear();
        self.bindings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_create_emits_parents_before_children() {
        let mut collector = MutationCollector::new();
        let mut registry = HandlerRegistry::new();
        let tree = Element::new("root", "div")
            .child(Element::new("btn", "button").text("t1", "Ok"));

        collector.begin_commit();
        collector.collect_create(None, &tree, 0, &mut registry);
        let batch = collector.flush_commit();

        let ids: Vec<&str> = batch.iter().map(|m| m.target_id()).collect();
        assert_eq!(ids, vec!["root", "btn", "t1"]);

        match &batch[2] {
            Mutation::Create {
                node_type, props, parent_id, ..
            } => {
                assert_eq!(node_type, TEXT_NODE_TYPE);
                assert_eq!(parent_id.as_deref(), Some("btn"));
                assert_eq!(props.as_ref().unwrap()[TEXT_PROP], json!("Ok"));
            }
            other => panic!("expected text create, got {:?}", other),
        }
    }

    #[test]
    fn test_set_props_diff() {
        let mut collector = MutationCollector::new();
        let mut registry = HandlerRegistry::new();

        let old = Element::new("n", "div")
            .prop("kept", json!(1))
            .prop("changed", json!("a"))
            .prop("removed", json!(true))
            .props;
        let new = Element::new("n", "div")
            .prop("kept", json!(1))
            .prop("changed", json!("b"))
            .prop("added", json!(2))
            .props;

        collector.begin_commit();
        collector.collect_set_props("n", &old, &new, &mut registry);
        let batch = collector.flush_commit();

        assert!(batch.contains(&Mutation::SetProp {
            node_id: "n".to_string(),
            key: "changed".to_string(),
            value: json!("b"),
        }));
        assert!(batch.contains(&Mutation::SetProp {
            node_id: "n".to_string(),
            key: "added".to_string(),
            value: json!(2),
        }));
        assert!(batch.contains(&Mutation::RemoveProp {
            node_id: "n".to_string(),
            key: "removed".to_string(),
        }));
        // Unchanged keys emit nothing.
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_handler_prop_update_retires_previous_id() {
        let mut collector = MutationCollector::new();
        let mut registry = HandlerRegistry::new();

        let old = Element::new("btn", "button")
            .handler("onClick", Arc::new(|_| Ok(json!(1))))
            .props;
        let new = Element::new("btn", "button")
            .handler("onClick", Arc::new(|_| Ok(json!(2))))
            .props;

        collector.begin_commit();
        collector.collect_set_props("btn", &ElementProps::new(), &old, &mut registry);
        let first = collector.flush_commit();

        collector.begin_commit();
        collector.collect_set_props("btn", &old, &new, &mut registry);
        let second = collector.flush_commit();

        let extract = |batch: &MutationBatch| match &batch[0] {
            Mutation::SetProp { key, value, .. } => {
                assert_eq!(key, "_onClickHandlerId");
                value.as_str().unwrap().to_string()
            }
            other => panic!("expected setProp, got {:?}", other),
        };
        let first_id = extract(&first);
        let second_id = extract(&second);

        assert_ne!(first_id, second_id);
        assert!(!registry.contains(&first_id));
        assert!(registry.contains(&second_id));
    }

    #[test]
    fn test_remove_unregisters_subtree_handlers() {
        let mut collector = MutationCollector::new();
        let mut registry = HandlerRegistry::new();
        let child = Element::new("btn", "button").handler("onClick", Arc::new(|_| Ok(json!(null))));

        collector.begin_commit();
        collector.collect_create(Some("root"), &child, 0, &mut registry);
        assert_eq!(registry.len(), 1);

        collector.collect_remove("root", &ElementChild::Node(child), &mut registry);
        assert!(registry.is_empty());

        let batch = collector.flush_commit();
        assert!(matches!(batch.last(), Some(Mutation::Remove { node_id, .. }) if node_id == "btn"));
    }

    #[test]
    fn test_begin_commit_clears_pending() {
        let mut collector = MutationCollector::new();
        collector.collect_set_text("t1", "left over");
        collector.begin_commit();
        assert_eq!(collector.pending(), 0);
    }
}
