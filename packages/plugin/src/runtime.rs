//! # Plugin runtime
//!
//! Ties the producer pieces together behind the plugin's RPC surface:
//! `initialize`, `updateProps`, `executeHandler`, `destroy`, and
//! `syncTree`. Owns the handler registry and the committed tree; the
//! application supplies a render function that builds an [`Element`]
//! tree from the current props.
//!
//! Full pushes (`updateTree`) are used for initialize, prop updates,
//! and recovery; incremental commits flow through [`PluginRuntime::
//! commit`] as `applyMutations` notifications.

use crate::element::Element;
use crate::handlers::HandlerRegistry;
use crate::render_root::RenderRoot;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, OnceLock};
use uniview_protocol::{methods, InitializeRequest, UiNode, PROTOCOL_VERSION};
use uniview_rpc::{RpcChannel, RpcError, RpcResult, RpcService};

/// Builds the UI tree for the current props.
pub type RenderFn = Arc<dyn Fn(&serde_json::Value) -> Element + Send + Sync>;

#[derive(Default)]
struct PluginState {
    registry: HandlerRegistry,
    root: RenderRoot,
    props: serde_json::Value,
    initialized: bool,
}

pub struct PluginRuntime {
    render: RenderFn,
    state: Mutex<PluginState>,
    channel: OnceLock<Arc<RpcChannel>>,
}

impl PluginRuntime {
    pub fn new(render: RenderFn) -> Arc<Self> {
        Arc::new(Self {
            render,
            state: Mutex::new(PluginState::default()),
            channel: OnceLock::new(),
        })
    }

    /// Attach the channel this runtime answers on. Called once, right
    /// after `RpcChannel::spawn` (the channel needs the runtime as its
    /// service, so the two are wired in two steps).
    pub fn attach(&self, channel: Arc<RpcChannel>) {
        let _ = self.channel.set(channel);
    }

    fn channel(&self) -> RpcResult<&Arc<RpcChannel>> {
        self.channel.get().ok_or(RpcError::NotConnected)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    /// Run one incremental commit. The closure drives the render-root
    /// notification API; the recorded batch is flushed to the host as
    /// an `applyMutations` notification. An empty batch sends nothing.
    pub async fn commit<F>(&self, build: F) -> RpcResult<()>
    where
        F: FnOnce(&mut RenderRoot, &mut HandlerRegistry),
    {
        let batch = {
            let mut state = self.state.lock().unwrap();
            let state = &mut *state;
            state.root.on_commit_start();
            build(&mut state.root, &mut state.registry);
            state.root.commit()
        };
        if batch.is_empty() {
            return Ok(());
        }
        let value = serde_json::to_value(batch).map_err(|e| RpcError::Protocol(e.to_string()))?;
        self.channel()?.notify(methods::APPLY_MUTATIONS, vec![value]).await
    }

    /// Forward a log line to the host console.
    pub async fn log(&self, level: &str, args: Vec<serde_json::Value>) -> RpcResult<()> {
        self.channel()?
            .notify(methods::LOG, vec![serde_json::json!(level), serde_json::json!(args)])
            .await
    }

    /// Report a fatal application error to the host.
    pub async fn report_error(&self, message: &str, stack: Option<String>) -> RpcResult<()> {
        self.channel()?
            .notify(
                methods::REPORT_ERROR,
                vec![serde_json::json!({ "message": message, "stack": stack })],
            )
            .await
    }

    async fn push_tree(&self, node: UiNode) -> RpcResult<()> {
        let value = serde_json::to_value(node).map_err(|e| RpcError::Protocol(e.to_string()))?;
        self.channel()?.notify(methods::UPDATE_TREE, vec![value]).await
    }

    /// Render from props and replace the committed tree.
    fn render_full(&self, props: serde_json::Value) -> UiNode {
        let mut state = self.state.lock().unwrap();
        let element = (self.render)(&props);
        state.props = props;
        let state = &mut *state;
        state.root.replace(element, &mut state.registry)
    }

    async fn handle_initialize(&self, args: Vec<serde_json::Value>) -> RpcResult<serde_json::Value> {
        let request: InitializeRequest = decode_arg(methods::INITIALIZE, args.into_iter().next())?;
        if request.protocol_version != PROTOCOL_VERSION {
            return Err(RpcError::Protocol(format!(
                "protocol version mismatch: host speaks {}, plugin speaks {}",
                request.protocol_version, PROTOCOL_VERSION
            )));
        }

        // A fresh initialize rebuilds everything; nothing registered
        // by a previous session may stay invocable.
        {
            let mut state = self.state.lock().unwrap();
            state.registry.clear();
            state.root.reset();
        }

        let node = self.render_full(request.props.unwrap_or(serde_json::Value::Null));
        self.state.lock().unwrap().initialized = true;
        self.push_tree(node).await?;
        if let Ok(channel) = self.channel() {
            channel.set_initialized();
        }
        tracing::info!("plugin initialized");
        Ok(serde_json::json!({ "protocolVersion": PROTOCOL_VERSION }))
    }

    async fn handle_update_props(
        &self,
        args: Vec<serde_json::Value>,
    ) -> RpcResult<serde_json::Value> {
        let props = args.into_iter().next().unwrap_or(serde_json::Value::Null);
        let node = self.render_full(props);
        self.push_tree(node).await?;
        Ok(serde_json::Value::Null)
    }

    fn handle_execute_handler(&self, args: Vec<serde_json::Value>) -> RpcResult<serde_json::Value> {
        let mut args = args.into_iter();
        let handler_id: String = decode_arg(methods::EXECUTE_HANDLER, args.next())?;
        let handler_args = match args.next() {
            Some(serde_json::Value::Array(values)) => values,
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        };
        self.state
            .lock()
            .unwrap()
            .registry
            .execute(&handler_id, handler_args)
            .map_err(RpcError::Handler)
    }

    fn handle_destroy(&self) -> serde_json::Value {
        let mut state = self.state.lock().unwrap();
        state.registry.clear();
        state.root.reset();
        state.initialized = false;
        tracing::info!("plugin destroyed");
        serde_json::Value::Null
    }

    async fn handle_sync_tree(&self) -> RpcResult<serde_json::Value> {
        let node = {
            let mut state = self.state.lock().unwrap();
            let state = &mut *state;
            state.root.snapshot(&mut state.registry)
        };
        if let Some(node) = node {
            self.push_tree(node).await?;
        }
        Ok(serde_json::Value::Null)
    }
}

#[async_trait]
impl RpcService for PluginRuntime {
    async fn handle(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> RpcResult<serde_json::Value> {
        match method {
            methods::INITIALIZE => self.handle_initialize(args).await,
            methods::UPDATE_PROPS => self.handle_update_props(args).await,
            methods::EXECUTE_HANDLER => self.handle_execute_handler(args),
            methods::DESTROY => Ok(self.handle_destroy()),
            methods::SYNC_TREE => self.handle_sync_tree().await,
            other => Err(RpcError::UnknownMethod(other.to_string())),
        }
    }
}

fn decode_arg<T: serde::de::DeserializeOwned>(
    method: &str,
    arg: Option<serde_json::Value>,
) -> RpcResult<T> {
    let value = arg.ok_or_else(|| RpcError::InvalidArgs {
        method: method.to_string(),
        reason: "missing argument".to_string(),
    })?;
    serde_json::from_value(value).map_err(|e| RpcError::InvalidArgs {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uniview_rpc::duplex_pair;

    struct NullService;

    #[async_trait]
    impl RpcService for NullService {
        async fn handle(
            &self,
            _method: &str,
            _args: Vec<serde_json::Value>,
        ) -> RpcResult<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    fn counter_app() -> RenderFn {
        Arc::new(|props| {
            let count = props.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
            Element::new("root", "column").child(
                Element::new("label", "text").prop("value", json!(count.to_string())),
            )
        })
    }

    async fn spawn_runtime() -> (Arc<PluginRuntime>, Arc<RpcChannel>) {
        spawn_app(counter_app()).await
    }

    async fn spawn_app(render: RenderFn) -> (Arc<PluginRuntime>, Arc<RpcChannel>) {
        let ((a, a_rx), (b, b_rx)) = duplex_pair();
        let runtime = PluginRuntime::new(render);
        let plugin_channel = RpcChannel::spawn(a, a_rx, runtime.clone());
        runtime.attach(plugin_channel);
        let host_channel = RpcChannel::spawn(b, b_rx, Arc::new(NullService));
        (runtime, host_channel)
    }

    #[tokio::test]
    async fn test_initialize_round_trip() {
        let (runtime, host) = spawn_runtime().await;
        let result = host
            .call(
                methods::INITIALIZE,
                vec![json!({ "protocolVersion": PROTOCOL_VERSION, "props": { "count": 3 } })],
            )
            .await
            .unwrap();
        assert_eq!(result, json!({ "protocolVersion": PROTOCOL_VERSION }));
        assert!(runtime.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_rejects_version_mismatch() {
        let (runtime, host) = spawn_runtime().await;
        let err = host
            .call(
                methods::INITIALIZE,
                vec![json!({ "protocolVersion": 99, "props": {} })],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Remote(message) if message.contains("version mismatch")));
        assert!(!runtime.is_initialized());
    }

    #[tokio::test]
    async fn test_execute_handler_runs_registered_callback() {
        let (runtime, host) = spawn_runtime().await;

        runtime
            .commit(|root, registry| {
                root.on_node_created(
                    None,
                    Element::new("btn", "button")
                        .handler("onClick", Arc::new(|args| Ok(json!(args.len())))),
                    0,
                    registry,
                );
            })
            .await
            .unwrap();

        // The committed tree holds exactly one handler, id handler_0.
        let result = host
            .call(methods::EXECUTE_HANDLER, vec![json!("handler_0"), json!([1, 2, 3])])
            .await
            .unwrap();
        assert_eq!(result, json!(3));
    }

    #[tokio::test]
    async fn test_execute_unknown_handler_is_null() {
        let (_runtime, host) = spawn_runtime().await;
        let result = host
            .call(methods::EXECUTE_HANDLER, vec![json!("handler_404"), json!([])])
            .await
            .unwrap();
        assert_eq!(result, json!(null));
    }

    #[tokio::test]
    async fn test_reinitialize_discards_previous_session_handlers() {
        // Renders a handler-bearing button only when props ask for it.
        let render: RenderFn = Arc::new(|props| {
            let root = Element::new("root", "column");
            if props.get("interactive").is_some() {
                root.child(
                    Element::new("btn", "button")
                        .handler("onClick", Arc::new(|_| Ok(json!("clicked")))),
                )
            } else {
                root
            }
        });
        let (_runtime, host) = spawn_app(render).await;

        host.call(
            methods::INITIALIZE,
            vec![json!({ "protocolVersion": PROTOCOL_VERSION, "props": { "interactive": true } })],
        )
        .await
        .unwrap();
        let result = host
            .call(methods::EXECUTE_HANDLER, vec![json!("handler_0"), json!([])])
            .await
            .unwrap();
        assert_eq!(result, json!("clicked"));

        // A second initialize starts a fresh session without the
        // button; the old handler id must be dead.
        host.call(
            methods::INITIALIZE,
            vec![json!({ "protocolVersion": PROTOCOL_VERSION, "props": {} })],
        )
        .await
        .unwrap();
        let result = host
            .call(methods::EXECUTE_HANDLER, vec![json!("handler_0"), json!([])])
            .await
            .unwrap();
        assert_eq!(result, json!(null));
    }

    #[tokio::test]
    async fn test_destroy_clears_state() {
        let (runtime, host) = spawn_runtime().await;
        host.call(
            methods::INITIALIZE,
            vec![json!({ "protocolVersion": PROTOCOL_VERSION, "props": {} })],
        )
        .await
        .unwrap();
        assert!(runtime.is_initialized());

        host.call(methods::DESTROY, vec![]).await.unwrap();
        assert!(!runtime.is_initialized());
    }

    #[tokio::test]
    async fn test_unknown_method_rejected() {
        let (_runtime, host) = spawn_runtime().await;
        let err = host.call("renderToPdf", vec![]).await.unwrap_err();
        assert_eq!(err, RpcError::Remote("Unknown method: renderToPdf".to_string()));
    }
}
