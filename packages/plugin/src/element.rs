//! Producer-side element tree
//!
//! The plugin's working representation of the UI: like the wire tree,
//! but props may hold live callbacks. Serialization replaces those
//! with handler ids ([`crate::serialize`]).

use crate::handlers::HandlerFn;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A prop value on the producer side.
#[derive(Clone)]
pub enum PropValue {
    Json(serde_json::Value),
    Handler(HandlerFn),
}

impl PropValue {
    /// Equality for diffing: JSON values compare by value, handlers
    /// by function identity (a re-created closure counts as changed).
    pub fn same_as(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Json(a), PropValue::Json(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for PropValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropValue::Json(value) => write!(f, "Json({value})"),
            PropValue::Handler(_) => write!(f, "Handler(..)"),
        }
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(value: serde_json::Value) -> Self {
        PropValue::Json(value)
    }
}

pub type ElementProps = BTreeMap<String, PropValue>;

/// A node in the producer tree.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: String,
    pub kind: String,
    pub props: ElementProps,
    pub children: Vec<ElementChild>,
}

/// A child slot. Text children carry a producer-assigned id so that
/// later `SetText` mutations can address them; the id is dropped when
/// the tree is serialized.
#[derive(Debug, Clone)]
pub enum ElementChild {
    Node(Element),
    Text { id: String, text: String },
}

impl Element {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            props: ElementProps::new(),
            children: Vec::new(),
        }
    }

    pub fn prop(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.props.insert(key.into(), PropValue::Json(value));
        self
    }

    pub fn handler(mut self, key: impl Into<String>, handler: HandlerFn) -> Self {
        self.props.insert(key.into(), PropValue::Handler(handler));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(ElementChild::Node(child));
        self
    }

    pub fn text(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.children.push(ElementChild::Text {
            id: id.into(),
            text: text.into(),
        });
        self
    }

    /// Depth-first lookup of a node by id.
    pub fn find(&self, id: &str) -> Option<&Element> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            ElementChild::Node(node) => node.find(id),
            ElementChild::Text { .. } => None,
        })
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| match child {
            ElementChild::Node(node) => node.find_mut(id),
            ElementChild::Text { .. } => None,
        })
    }
}

impl ElementChild {
    /// The id addressing this child in mutations.
    pub fn id(&self) -> &str {
        match self {
            ElementChild::Node(node) => &node.id,
            ElementChild::Text { id, .. } => id,
        }
    }
}
