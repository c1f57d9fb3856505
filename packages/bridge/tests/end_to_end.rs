//! Full-system test: a plugin and a host in the same process, talking
//! through the bridge over real WebSockets.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uniview_bridge::{app, SessionRegistry};
use uniview_host::HostController;
use uniview_plugin::{Element, PluginRuntime};
use uniview_rpc::{ConnectionState, RpcChannel};

async fn start_bridge() -> u16 {
    let registry = Arc::new(SessionRegistry::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app(registry, None)).await.unwrap();
    });
    port
}

#[tokio::test]
async fn test_plugin_and_host_pair_through_bridge() {
    let port = start_bridge().await;

    // Plugin endpoint.
    let runtime = PluginRuntime::new(Arc::new(|props| {
        let title = props
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("untitled")
            .to_string();
        Element::new("root", "column")
            .prop("title", json!(title))
            .child(Element::new("greet", "button").handler(
                "onClick",
                Arc::new(|args| Ok(json!({ "echo": args }))),
            ))
    }));
    let plugin_channel =
        RpcChannel::connect_ws(&format!("ws://127.0.0.1:{port}/plugins/p1"), runtime.clone())
            .await
            .unwrap();
    assert_eq!(plugin_channel.state(), ConnectionState::Connected);
    runtime.attach(plugin_channel);

    // Host endpoint.
    let controller = HostController::new();
    let host_channel =
        RpcChannel::connect_ws(&format!("ws://127.0.0.1:{port}/host/p1"), controller.clone())
            .await
            .unwrap();
    assert_eq!(host_channel.state(), ConnectionState::Connected);
    controller.attach(host_channel.clone());

    controller.initialize(json!({ "title": "demo" })).await.unwrap();
    assert_eq!(host_channel.state(), ConnectionState::Initialized);

    // The full tree push is a notification; poll until it lands.
    let root = {
        let mut root = None;
        for _ in 0..100 {
            root = controller.root();
            if root.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        root.expect("tree did not arrive within deadline")
    };
    assert_eq!(root.id, "root");
    assert_eq!(root.props["title"], json!("demo"));

    // Interaction routes back through the opaque handler id.
    let handler_id = root
        .children
        .iter()
        .find_map(|child| match child {
            uniview_host::ReplicaChild::Node(node) if node.id == "greet" => {
                node.props["_onClickHandlerId"].as_str().map(str::to_string)
            }
            _ => None,
        })
        .unwrap();
    let result = controller
        .execute_handler(&handler_id, vec![json!("hi")])
        .await
        .unwrap();
    assert_eq!(result, json!({ "echo": ["hi"] }));
}
