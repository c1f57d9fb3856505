//! # Uniview Plugin
//!
//! The producer side of the tree-synchronization protocol. A plugin
//! builds an [`Element`] tree whose props may hold live callbacks;
//! serialization replaces callbacks with opaque handler ids so the
//! tree can cross the process boundary, and the [`HandlerRegistry`]
//! routes `executeHandler` calls back to the original closures.
//!
//! Two update modes:
//!
//! - **full**: every change re-renders and pushes the whole tree
//!   (`updateTree`) — simple, used for initialize and recovery.
//! - **incremental**: a rendering front-end drives the [`RenderRoot`]
//!   commit API and each commit ships only its [`MutationBatch`]
//!   (`applyMutations`).

mod collector;
mod element;
mod handlers;
mod render_root;
mod runtime;
mod serialize;

pub use collector::MutationCollector;
pub use element::{Element, ElementChild, ElementProps, PropValue};
pub use handlers::{HandlerFn, HandlerRegistry};
pub use render_root::RenderRoot;
pub use runtime::{PluginRuntime, RenderFn};
pub use serialize::{release_subtree, serialize_props, serialize_tree, HandlerBindings};
