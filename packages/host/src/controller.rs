//! # Host controller
//!
//! The consumer-side endpoint: owns the replica, answers the
//! host-exposed methods (`updateTree`, `applyMutations`, `log`,
//! `reportError`) and drives the plugin through the plugin-exposed
//! ones. When a batch drops mutations, the controller asks the plugin
//! for a full tree (`syncTree`) to converge again.

use crate::mutable_tree::{ApplyOutcome, MutableTree, ReplicaNode, TreeEvent};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::mpsc;
use uniview_protocol::{
    methods, ErrorReport, InitializeRequest, LogLevel, MutationBatch, UiNode, PROTOCOL_VERSION,
};
use uniview_rpc::{RpcChannel, RpcError, RpcResult, RpcService};

#[derive(Default)]
pub struct HostController {
    tree: Mutex<MutableTree>,
    channel: OnceLock<Arc<RpcChannel>>,
}

impl HostController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach the channel this controller answers on. Called once,
    /// right after `RpcChannel::spawn`.
    pub fn attach(&self, channel: Arc<RpcChannel>) {
        let _ = self.channel.set(channel);
    }

    fn channel(&self) -> RpcResult<&Arc<RpcChannel>> {
        self.channel.get().ok_or(RpcError::NotConnected)
    }

    pub fn root(&self) -> Option<Arc<ReplicaNode>> {
        self.tree.lock().unwrap().root()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TreeEvent> {
        self.tree.lock().unwrap().subscribe()
    }

    /// Start the session: send our protocol version and initial props.
    pub async fn initialize(&self, props: serde_json::Value) -> RpcResult<()> {
        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION,
            props: Some(props),
        };
        let args = vec![serde_json::to_value(request)
            .map_err(|e| RpcError::Protocol(e.to_string()))?];
        self.channel()?.call(methods::INITIALIZE, args).await?;
        self.channel()?.set_initialized();
        Ok(())
    }

    pub async fn update_props(&self, props: serde_json::Value) -> RpcResult<()> {
        self.channel()?
            .call(methods::UPDATE_PROPS, vec![props])
            .await?;
        Ok(())
    }

    /// Invoke a plugin callback by its opaque id.
    pub async fn execute_handler(
        &self,
        handler_id: &str,
        args: Vec<serde_json::Value>,
    ) -> RpcResult<serde_json::Value> {
        self.channel()?
            .call(
                methods::EXECUTE_HANDLER,
                vec![serde_json::json!(handler_id), serde_json::Value::Array(args)],
            )
            .await
    }

    pub async fn destroy(&self) -> RpcResult<()> {
        self.channel()?.call(methods::DESTROY, vec![]).await?;
        Ok(())
    }

    /// Ask the plugin for a full tree push. Recovery path after
    /// dropped mutations.
    pub async fn sync_tree(&self) -> RpcResult<()> {
        self.channel()?.call(methods::SYNC_TREE, vec![]).await?;
        Ok(())
    }

    fn handle_update_tree(&self, args: Vec<serde_json::Value>) -> RpcResult<serde_json::Value> {
        let tree: Option<UiNode> = match args.into_iter().next() {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value).map_err(|e| {
                RpcError::InvalidArgs {
                    method: methods::UPDATE_TREE.to_string(),
                    reason: e.to_string(),
                }
            })?),
        };
        self.tree.lock().unwrap().init(tree.as_ref());
        Ok(serde_json::Value::Null)
    }

    fn apply_mutations(&self, args: Vec<serde_json::Value>) -> RpcResult<ApplyOutcome> {
        let batch: MutationBatch = match args.into_iter().next() {
            None => Vec::new(),
            Some(value) => serde_json::from_value(value).map_err(|e| RpcError::InvalidArgs {
                method: methods::APPLY_MUTATIONS.to_string(),
                reason: e.to_string(),
            })?,
        };
        Ok(self.tree.lock().unwrap().apply(&batch))
    }

    fn handle_log(&self, args: Vec<serde_json::Value>) {
        let mut args = args.into_iter();
        let level = args
            .next()
            .and_then(|v| serde_json::from_value::<LogLevel>(v).ok())
            .unwrap_or(LogLevel::Log);
        let rest: Vec<_> = args.collect();
        match level {
            LogLevel::Error => tracing::error!(target: "plugin", "{:?}", rest),
            LogLevel::Warn => tracing::warn!(target: "plugin", "{:?}", rest),
            LogLevel::Info | LogLevel::Log => tracing::info!(target: "plugin", "{:?}", rest),
        }
    }

    fn handle_report_error(&self, args: Vec<serde_json::Value>) -> RpcResult<serde_json::Value> {
        let report: ErrorReport = match args.into_iter().next() {
            Some(value) => serde_json::from_value(value).map_err(|e| RpcError::InvalidArgs {
                method: methods::REPORT_ERROR.to_string(),
                reason: e.to_string(),
            })?,
            None => {
                return Err(RpcError::InvalidArgs {
                    method: methods::REPORT_ERROR.to_string(),
                    reason: "missing report".to_string(),
                })
            }
        };
        tracing::error!(
            target: "plugin",
            "plugin error: {}{}",
            report.message,
            report
                .stack
                .as_deref()
                .map(|s| format!("\n{s}"))
                .unwrap_or_default()
        );
        Ok(serde_json::Value::Null)
    }
}

#[async_trait]
impl RpcService for HostController {
    async fn handle(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> RpcResult<serde_json::Value> {
        match method {
            methods::UPDATE_TREE => self.handle_update_tree(args),
            methods::APPLY_MUTATIONS => {
                let outcome = self.apply_mutations(args)?;
                if outcome.needs_resync() {
                    tracing::warn!(
                        "replica diverged ({} mutations dropped), requesting full tree",
                        outcome.dropped
                    );
                    if let Err(e) = self.sync_tree().await {
                        tracing::warn!("syncTree request failed: {}", e);
                    }
                }
                Ok(serde_json::Value::Null)
            }
            methods::LOG => {
                self.handle_log(args);
                Ok(serde_json::Value::Null)
            }
            methods::REPORT_ERROR => self.handle_report_error(args),
            other => Err(RpcError::UnknownMethod(other.to_string())),
        }
    }
}
