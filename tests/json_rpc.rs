mod common;

use aicf_rpc::{Dispatcher, DispatcherConfig};
use common::{fixture, tool_names};
use serde_json::{Value, json};
use std::time::Duration;

fn dispatcher() -> Dispatcher {
    fixture(DispatcherConfig::default().with_server_name("figma-bridge"))
}

async fn call(dispatcher: &Dispatcher, request: Value) -> Value {
    let reply = dispatcher.handle_json_rpc(&request.to_string()).await;
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn named_invocation_returns_the_result() {
    let reply = dispatcher()
        .handle_json_rpc(
            r#"{"jsonrpc":"2.0","id":"7","method":"tool-invoke","params":{"tool":"sum","arguments":{"a":2,"b":3}}}"#,
        )
        .await;
    assert_eq!(reply, r#"{"jsonrpc":"2.0","id":"7","result":5}"#);
}

#[tokio::test]
async fn array_arguments_map_positionally() {
    let reply = call(
        &dispatcher(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "tool-invoke",
               "params": {"tool": "echo.tool", "arguments": ["hi", 3]}}),
    )
    .await;
    assert_eq!(reply["result"], json!({"msg": "hi", "count": 3}));
}

#[tokio::test]
async fn handshake_opens_a_session() {
    let dispatcher = dispatcher();
    let reply = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 1, "method": "handshake",
               "params": {"client": {"name": "figma-plugin"}}}),
    )
    .await;
    let result = &reply["result"];
    assert_eq!(result["server"]["name"], "figma-bridge");
    assert_eq!(result["server"]["protocol"], "AICF-RPC/1.0");

    let id = result["session"]["id"].as_str().unwrap();
    assert!(id.starts_with("session_"));
    let session = dispatcher.sessions().get(id).unwrap();
    let ttl = result["session"]["expiresAt"].as_u64().unwrap()
        - result["session"]["createdAt"].as_u64().unwrap();
    assert_eq!(ttl, 3_600_000);
    assert!(!session.is_expired_at(session.created_at()));

    call(&dispatcher, json!({"jsonrpc": "2.0", "id": 2, "method": "handshake"})).await;
    assert_eq!(dispatcher.sessions().len(), 2);
    assert_eq!(dispatcher.sweep_sessions(), 0);
}

#[tokio::test]
async fn capability_list_has_tools_then_contexts() {
    let reply = call(
        &dispatcher(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "capability-list"}),
    )
    .await;
    let capabilities = reply["result"].as_array().unwrap();
    let listed: Vec<(&str, &str)> = capabilities
        .iter()
        .map(|c| (c["kind"].as_str().unwrap(), c["name"].as_str().unwrap()))
        .collect();
    let mut expected: Vec<(&str, &str)> = tool_names().into_iter().map(|n| ("tool", n)).collect();
    expected.push(("context", "selection"));
    expected.push(("context", "document"));
    assert_eq!(listed, expected);

    assert_eq!(
        capabilities[0]["inputSchema"]["required"],
        json!(["msg"])
    );
    assert_eq!(capabilities[4]["dangerous"], json!(true));
    assert_eq!(capabilities[6]["format"], "structured-text");
}

#[tokio::test]
async fn contexts_are_fetched_or_unavailable() {
    let dispatcher = dispatcher();
    let found = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 1, "method": "context-get", "params": {"context": "selection"}}),
    )
    .await;
    assert_eq!(found["result"], json!({"nodes": ["1:2", "1:3"]}));

    let missing = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 2, "method": "context-get", "params": {"context": "nope"}}),
    )
    .await;
    assert_eq!(
        missing["error"],
        json!({"code": -32003, "message": "Context not available: nope"})
    );

    let failing = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 3, "method": "context-get", "params": {"context": "document"}}),
    )
    .await;
    assert_eq!(failing["id"], 3);
    assert_eq!(
        failing["error"],
        json!({
            "code": -32003,
            "message": "Context not available: document",
            "data": {"context": "document", "cause": "no document open"}
        })
    );
}

#[tokio::test]
async fn tool_failures_carry_codes_and_data() {
    let dispatcher = dispatcher();
    let missing = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tool-invoke", "params": {"tool": "ghost"}}),
    )
    .await;
    assert_eq!(missing["error"]["code"], -32001);
    assert_eq!(missing["error"]["message"], "Tool not found: ghost");

    let failed = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tool-invoke", "params": {"tool": "fail.tool"}}),
    )
    .await;
    assert_eq!(
        failed["error"],
        json!({
            "code": -32002,
            "message": "Tool execution failed: fail.tool: element not found",
            "data": {"tool": "fail.tool", "details": {"selector": "#go"}}
        })
    );

    let panicked = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 3, "method": "tool-invoke", "params": {"tool": "panic.tool"}}),
    )
    .await;
    assert_eq!(panicked["error"]["code"], -32002);
    assert!(panicked.get("result").is_none());
}

#[tokio::test(start_paused = true)]
async fn timeout_hint_bounds_the_handler() {
    let dispatcher = dispatcher();
    let started = tokio::time::Instant::now();
    let reply = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 9, "method": "tool-invoke",
               "params": {"tool": "slow.tool", "timeoutMs": 100}}),
    )
    .await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(200), "{elapsed:?}");
    assert_eq!(
        reply["error"],
        json!({
            "code": -32002,
            "message": "Tool execution failed: slow.tool: timed out after 100ms",
            "data": {"tool": "slow.tool", "timeoutMs": 100}
        })
    );
}

#[tokio::test(start_paused = true)]
async fn hint_overrides_the_configured_default() {
    let dispatcher = fixture(
        DispatcherConfig::default().with_default_timeout(Some(Duration::from_secs(30))),
    );
    let started = tokio::time::Instant::now();
    let reply = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tool-invoke",
               "params": {"tool": "slow.tool", "timeoutMs": 250}}),
    )
    .await;
    assert_eq!(reply["error"]["data"]["timeoutMs"], 250);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn protocol_errors_use_standard_codes() {
    let dispatcher = dispatcher();

    let reply = dispatcher.handle_json_rpc("{\"jsonrpc\":").await;
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], -32700);

    let reply = call(&dispatcher, json!({"jsonrpc": "1.0", "id": 4, "method": "handshake"})).await;
    assert_eq!(reply["id"], 4);
    assert_eq!(reply["error"]["code"], -32600);

    let reply = call(&dispatcher, json!({"jsonrpc": "2.0", "id": "x", "method": "tools/list"})).await;
    assert_eq!(reply["id"], "x");
    assert_eq!(reply["error"]["code"], -32601);
    assert_eq!(reply["error"]["message"], "Method not found: tools/list");

    let reply = call(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 5, "method": "tool-invoke", "params": {"tool": 12}}),
    )
    .await;
    assert_eq!(reply["error"]["code"], -32602);
}
