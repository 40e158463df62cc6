/*!
A dual-protocol tool dispatcher for Rust.

aicf-rpc lets an application expose *tools* (named, schema-described operations)
and *contexts* (named, read-only data sources) to AI agents and plugins. Requests
arrive in one of two wire formats and are answered in the same format:

* a compact, pipe-delimited line format tuned for token efficiency, e.g.
  `CALL|figma.rename|1:2|New name`, and
* a conventional [JSON-RPC 2.0](https://www.jsonrpc.org/specification) envelope.

# Overview

Both formats decode into the same [`canonical`] request model, which the
[`Dispatcher`] routes to the [`registry`] of tools and contexts. A handler's
result (or its failure) is encoded back in the caller's format.

```text
line / JSON ──► wire / jrpc ──► canonical::Request ──► Dispatcher ──► canonical::Response ──► wire / jrpc
```

# Key Features

- **Two wire formats, one model**: the compact format passes arguments
  positionally and maps them onto the tool's declared schema
- **Async handlers**: tools are `async` closures or [`ToolHandler`] impls running
  on tokio
- **Failure containment**: handler errors, panics and timeouts always come back as
  failure responses, never as a crashed dispatcher
- **Sessions**: every handshake opens an expiring session
- **Privacy-aware logging** through logwise

# Quick Start

```
use aicf_rpc::registry::tools::{Argument, InputSchema, ToolDescriptor, ToolError};
use aicf_rpc::{Dispatcher, DispatcherConfig};
use serde_json::{Map, Value, json};

# #[tokio::main(flavor = "current_thread")]
# async fn main() {
let dispatcher = Dispatcher::new(DispatcherConfig::default().with_server_name("demo"));
dispatcher.register(
    ToolDescriptor::new(
        "sum",
        "Adds two numbers",
        InputSchema::new(vec![
            Argument::new("a", "number", "First operand", true),
            Argument::new("b", "number", "Second operand", true),
        ]),
    ),
    |args: Map<String, Value>| async move {
        let a = args.get("a").and_then(Value::as_f64).ok_or("a must be a number")?;
        let b = args.get("b").and_then(Value::as_f64).ok_or("b must be a number")?;
        Ok::<Value, ToolError>(json!(a + b))
    },
);

// compact
assert_eq!(dispatcher.handle_compact("CALL|sum|2|3").await, "OK|5.0");

// JSON-RPC
let reply = dispatcher
    .handle_json_rpc(r#"{"jsonrpc":"2.0","id":1,"method":"tool-invoke","params":{"tool":"sum","arguments":[2,3]}}"#)
    .await;
assert_eq!(reply, r#"{"jsonrpc":"2.0","id":1,"result":5.0}"#);
# }
```

# Transports

aicf-rpc does not open sockets. Feed it lines or JSON documents from whatever
transport you have (a WebSocket, stdio, an HTTP body) and write back the string
it returns. Remember to call [`Dispatcher::sweep_sessions`] periodically.
*/

pub mod canonical;
pub mod config;
pub mod dispatch;
mod error;
pub mod jrpc;
pub mod registry;
pub mod session;
pub mod wire;

pub use config::DispatcherConfig;
pub use dispatch::Dispatcher;
pub use error::*;
pub use registry::contexts::{ContextDescriptor, ContextFormat, ContextProvider};
pub use registry::tools::{Argument, InputSchema, ToolDescriptor, ToolError, ToolHandler};
