//! Serializable UI tree
//!
//! This is the protocol-level representation of a UI element. The
//! plugin owns the authoritative tree; the host holds a replica built
//! from serialized snapshots and mutation batches.
//!
//! - `id` is globally unique and stable across renders of the same
//!   logical element (the host reconciles by id)
//! - `node_type` is either a well-known layout tag or a
//!   product-defined primitive name
//! - `props` hold only JSON-representable values, plus handler-id
//!   strings standing in for event callbacks
//! - `children` mix nested nodes and literal text

use serde::{Deserialize, Serialize};

/// Prop map carried by every node. String keys, JSON values only.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Node type used by `Create` mutations that insert a literal text
/// child. The text itself travels in the [`TEXT_PROP`] prop; in
/// serialized trees text children appear inline as plain strings.
pub const TEXT_NODE_TYPE: &str = "text";

/// Prop key carrying the content of a text-node `Create`.
pub const TEXT_PROP: &str = "text";

/// Layout tags rendered as native elements by host adapters.
pub const LAYOUT_TAGS: &[&str] = &[
    "div", "span", "p", "section", "header", "footer", "nav", "main", "aside", "article", "ul",
    "ol", "li", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "button", "input", "textarea",
    "select", "option", "label", "form", "a", "img", "table", "thead", "tbody", "tr", "th", "td",
    "strong", "em", "code", "pre",
];

/// Check whether a node type is a layout tag (as opposed to a
/// product-defined primitive).
pub fn is_layout_tag(node_type: &str) -> bool {
    LAYOUT_TAGS.contains(&node_type)
}

/// A node in the serializable UI tree.
///
/// Invariant: the structure is a tree, not a graph — no node is
/// reachable from two parents and there are no cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    /// Unique identifier, stable across renders (for reconciliation)
    pub id: String,

    /// Layout tag or product-defined primitive name
    #[serde(rename = "type")]
    pub node_type: String,

    /// JSON-serializable props; event handlers appear as
    /// `_<event>HandlerId` string props
    pub props: Props,

    /// Child nodes or literal text
    pub children: Vec<UiChild>,
}

/// A child slot: either a nested node or literal text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UiChild {
    Text(String),
    Node(UiNode),
}

impl UiNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    /// Depth-first search for a node by id.
    pub fn find(&self, id: &str) -> Option<&UiNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            UiChild::Node(node) => node.find(id),
            UiChild::Text(_) => None,
        })
    }

    /// Visit every node in the subtree, parents before children.
    pub fn for_each(&self, f: &mut impl FnMut(&UiNode)) {
        f(self);
        for child in &self.children {
            if let UiChild::Node(node) = child {
                node.for_each(f);
            }
        }
    }

    /// Total number of nodes in the subtree (text children excluded).
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.for_each(&mut |_| count += 1);
        count
    }
}

impl UiChild {
    pub fn as_node(&self) -> Option<&UiNode> {
        match self {
            UiChild::Node(node) => Some(node),
            UiChild::Text(_) => None,
        }
    }

    /// The id of a node child; text children have no id.
    pub fn node_id(&self) -> Option<&str> {
        self.as_node().map(|n| n.id.as_str())
    }
}
