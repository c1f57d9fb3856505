//! # Uniview Host
//!
//! The consumer side of the tree-synchronization protocol: a mutable
//! replica of the plugin's UI tree plus the controller that speaks the
//! RPC surface. Rendering front-ends subscribe to the replica's
//! [`TreeEvent`] stream and read immutable [`ReplicaNode`] roots;
//! interactions route back through
//! [`HostController::execute_handler`].

mod controller;
mod mutable_tree;

pub use controller::HostController;
pub use mutable_tree::{
    ApplyOutcome, MutableTree, MutationError, ReplicaChild, ReplicaNode, TreeEvent,
};
