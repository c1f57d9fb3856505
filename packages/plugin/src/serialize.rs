//! Tree and prop serialization
//!
//! Turns the producer [`Element`] tree into the wire [`UiNode`] tree.
//! Event-prop callbacks (`on` + uppercase keys) are registered in the
//! [`HandlerRegistry`] and replaced by `_<event>HandlerId` string
//! props; callbacks under non-event keys are skipped entirely.
//!
//! [`HandlerBindings`] tracks which handler id currently backs each
//! `(node, key)` pair so that re-serialization or a prop update can
//! retire the previous id instead of leaking it for the life of the
//! session.

use crate::element::{Element, ElementChild, ElementProps, PropValue};
use crate::handlers::HandlerRegistry;
use std::collections::HashMap;
use uniview_protocol::{handler_id_prop, is_event_prop, HandlerId, Props, UiChild, UiNode};

/// Live handler id per `(node_id, prop_key)`.
pub type HandlerBindings = HashMap<(String, String), HandlerId>;

/// Serialize one node's props, registering event handlers.
pub fn serialize_props(
    node_id: &str,
    props: &ElementProps,
    registry: &mut HandlerRegistry,
    bindings: &mut HandlerBindings,
) -> Props {
    let mut out = Props::new();
    for (key, value) in props {
        match value {
            PropValue::Handler(handler) if is_event_prop(key) => {
                let id = registry.register(handler.clone());
                let binding = (node_id.to_string(), key.clone());
                if let Some(previous) = bindings.insert(binding, id.clone()) {
                    registry.remove(&previous);
                }
                out.insert(handler_id_prop(key), serde_json::Value::String(id));
            }
            // Callbacks outside the event convention cannot cross the
            // boundary; drop them.
            PropValue::Handler(_) => {}
            PropValue::Json(value) => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// Serialize a whole subtree. Text children become inline strings.
pub fn serialize_tree(
    element: &Element,
    registry: &mut HandlerRegistry,
    bindings: &mut HandlerBindings,
) -> UiNode {
    UiNode {
        id: element.id.clone(),
        node_type: element.kind.clone(),
        props: serialize_props(&element.id, &element.props, registry, bindings),
        children: element
            .children
            .iter()
            .map(|child| match child {
                ElementChild::Node(node) => UiChild::Node(serialize_tree(node, registry, bindings)),
                ElementChild::Text { text, .. } => UiChild::Text(text.clone()),
            })
            .collect(),
    }
}

/// Unregister every handler owned by a subtree. Must run whenever a
/// subtree is removed, or its handlers leak for the session.
pub fn release_subtree(
    element: &Element,
    registry: &mut HandlerRegistry,
    bindings: &mut HandlerBindings,
) {
    bindings.retain(|(node_id, _), handler_id| {
        if element.find(node_id).is_some() {
            registry.remove(handler_id);
            false
        } else {
            true
        }
    });
}
