//! # Handler registry
//!
//! Function-valued props cannot be serialized across the plugin–host
//! boundary. The registry is the explicit indirection table: the
//! plugin keeps the callback, ships an opaque [`HandlerId`], and the
//! host routes interactions back through `executeHandler`.
//!
//! ## Invariants
//!
//! - Ids are monotonically distinct and never reused within a
//!   session, so a stale id from a removal race is harmlessly ignored
//!   instead of invoking a different, newer handler.
//! - Executing an unknown id resolves to a no-op (`Null`), not an
//!   error: removal and late-arriving invocations race benignly.

use std::collections::HashMap;
use std::sync::Arc;
use uniview_protocol::HandlerId;

/// A registered callback. Arguments and return value are JSON values;
/// failures surface as a message string carried back to the host.
pub type HandlerFn =
    Arc<dyn Fn(Vec<serde_json::Value>) -> Result<serde_json::Value, String> + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerId, HandlerFn>,
    next_id: u64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback under a fresh id.
    pub fn register(&mut self, handler: HandlerFn) -> HandlerId {
        let id = format!("handler_{}", self.next_id);
        self.next_id += 1;
        self.handlers.insert(id.clone(), handler);
        id
    }

    /// Invoke a handler. Unknown ids resolve to `Null`.
    pub fn execute(
        &self,
        id: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, String> {
        match self.handlers.get(id) {
            Some(handler) => handler(args),
            None => {
                tracing::debug!("executeHandler for unknown id {}, ignoring", id);
                Ok(serde_json::Value::Null)
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) {
        self.handlers.remove(id);
    }

    /// Drop every handler. The id counter is deliberately not reset:
    /// ids stay unique for the life of the session.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_execute() {
        let mut registry = HandlerRegistry::new();
        let id = registry.register(Arc::new(|args| {
            Ok(json!(args.len()))
        }));

        assert_eq!(id, "handler_0");
        let result = registry.execute(&id, vec![json!(1), json!(2)]).unwrap();
        assert_eq!(result, json!(2));
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut registry = HandlerRegistry::new();
        let id = registry.register(Arc::new(|_| Err("boom".to_string())));
        assert_eq!(registry.execute(&id, vec![]), Err("boom".to_string()));
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let registry = HandlerRegistry::new();
        assert_eq!(registry.execute("handler_99", vec![]).unwrap(), json!(null));
    }

    #[test]
    fn test_ids_never_reused_after_clear() {
        let mut registry = HandlerRegistry::new();
        let first = registry.register(Arc::new(|_| Ok(json!("a"))));
        registry.clear();
        let second = registry.register(Arc::new(|_| Ok(json!("b"))));
        assert_ne!(first, second);
        // The stale id is a no-op, not the new handler.
        assert_eq!(registry.execute(&first, vec![]).unwrap(), json!(null));
        assert_eq!(registry.execute(&second, vec![]).unwrap(), json!("b"));
    }
}
