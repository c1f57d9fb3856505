//! # Mutation vocabulary
//!
//! Instead of sending the entire tree on every change, plugins send a
//! batch of mutations describing only what changed. This keeps RPC
//! payloads at O(changes) instead of O(tree size).
//!
//! ## Semantics
//!
//! - Order within a batch is significant and must be replayed in that
//!   order: a `SetProp` may target a node created earlier in the same
//!   batch.
//! - A batch is valid against a tree when every `parent_id`/`node_id`
//!   referenced by a non-`Create` mutation names a node present in the
//!   initial tree or created earlier in the stream.
//! - Two batches that take the same starting tree to the same final
//!   tree are interchangeable.

use crate::tree::Props;
use serde::{Deserialize, Serialize};

/// One structural change to the UI tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mutation {
    /// Create a new node and insert it under `parent_id` at `index`
    /// (clamped to the children length). `parent_id: None` replaces
    /// the root.
    #[serde(rename_all = "camelCase")]
    Create {
        node_id: String,
        node_type: String,
        parent_id: Option<String>,
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        props: Option<Props>,
    },

    /// Remove a node (and its whole subtree) from its parent.
    #[serde(rename_all = "camelCase")]
    Remove { node_id: String, parent_id: String },

    /// Set a single prop. Event handlers arrive as
    /// `_<event>HandlerId` string props.
    #[serde(rename_all = "camelCase")]
    SetProp {
        node_id: String,
        key: String,
        value: serde_json::Value,
    },

    /// Remove a prop.
    #[serde(rename_all = "camelCase")]
    RemoveProp { node_id: String, key: String },

    /// Replace the content of a text node.
    #[serde(rename_all = "camelCase")]
    SetText { node_id: String, text: String },

    /// Rebuild a parent's child order to match `child_ids`. Children
    /// omitted from the list keep their relative order at the end.
    #[serde(rename_all = "camelCase")]
    Reorder {
        parent_id: String,
        child_ids: Vec<String>,
    },
}

/// Ordered list of mutations produced by one render commit.
pub type MutationBatch = Vec<Mutation>;

impl Mutation {
    /// The node id this mutation targets (the parent for `Reorder`).
    pub fn target_id(&self) -> &str {
        match self {
            Mutation::Create { node_id, .. }
            | Mutation::Remove { node_id, .. }
            | Mutation::SetProp { node_id, .. }
            | Mutation::RemoveProp { node_id, .. }
            | Mutation::SetText { node_id, .. } => node_id,
            Mutation::Reorder { parent_id, .. } => parent_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mutation_serialization() {
        let mutation = Mutation::SetProp {
            node_id: "n1".to_string(),
            key: "label".to_string(),
            value: json!("hello"),
        };

        let json = serde_json::to_string(&mutation).unwrap();
        let deserialized: Mutation = serde_json::from_str(&json).unwrap();

        assert_eq!(mutation, deserialized);
    }

    #[test]
    fn test_wire_tags_are_camel_case() {
        let mutation = Mutation::RemoveProp {
            node_id: "n1".to_string(),
            key: "label".to_string(),
        };
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["type"], "removeProp");
        assert_eq!(value["nodeId"], "n1");
    }

    #[test]
    fn test_create_wire_fixture() {
        // Exact shape hosts written against the protocol expect.
        let frame = json!({
            "type": "create",
            "nodeId": "n2",
            "nodeType": "button",
            "parentId": "root",
            "index": 0,
            "props": { "label": "Ok" }
        });
        let mutation: Mutation = serde_json::from_value(frame).unwrap();
        match mutation {
            Mutation::Create {
                node_id,
                node_type,
                parent_id,
                index,
                props,
            } => {
                assert_eq!(node_id, "n2");
                assert_eq!(node_type, "button");
                assert_eq!(parent_id.as_deref(), Some("root"));
                assert_eq!(index, 0);
                assert_eq!(props.unwrap()["label"], json!("Ok"));
            }
            other => panic!("unexpected mutation: {:?}", other),
        }
    }

    #[test]
    fn test_root_create_has_null_parent() {
        let mutation = Mutation::Create {
            node_id: "root".to_string(),
            node_type: "div".to_string(),
            parent_id: None,
            index: 0,
            props: None,
        };
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["parentId"], serde_json::Value::Null);
    }
}
