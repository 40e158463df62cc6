#![allow(dead_code, reason = "Each test suite uses a different subset of the fixture.")]

use aicf_rpc::registry::contexts::{ContextDescriptor, ContextFormat};
use aicf_rpc::registry::tools::{Argument, InputSchema, ToolDescriptor, ToolError, ToolHandler};
use aicf_rpc::{Dispatcher, DispatcherConfig};
use serde_json::{Map, Value, json};

struct Panics;

#[async_trait::async_trait]
impl ToolHandler for Panics {
    async fn call(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        panic!("handler exploded")
    }
}

struct Stalls;

#[async_trait::async_trait]
impl ToolHandler for Stalls {
    async fn call(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        std::future::pending::<Result<Value, ToolError>>().await
    }
}

/// A dispatcher with one tool per interesting behaviour and two contexts.
pub fn fixture(config: DispatcherConfig) -> Dispatcher {
    let dispatcher = Dispatcher::new(config);
    dispatcher.register(
        ToolDescriptor::new(
            "echo.tool",
            "Echoes its arguments",
            InputSchema::new(vec![
                Argument::new("msg", "string", "Message", true),
                Argument::new("count", "number", "Repetitions", false),
                Argument::new("flag", "boolean", "A switch", false),
            ]),
        ),
        |args: Map<String, Value>| async move { Ok::<Value, ToolError>(Value::Object(args)) },
    );
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
            let a = args.get("a").and_then(Value::as_i64).ok_or("a must be an integer")?;
            let b = args.get("b").and_then(Value::as_i64).ok_or("b must be an integer")?;
            Ok::<Value, ToolError>(json!(a + b))
        },
    );
    dispatcher.register(
        ToolDescriptor::new("fail.tool", "Always fails", InputSchema::empty()),
        |_args: Map<String, Value>| async move {
            Err::<Value, ToolError>(
                ToolError::new("element not found").with_data(json!({"selector": "#go"})),
            )
        },
    );
    dispatcher.register(
        ToolDescriptor::new("panic.tool", "Always panics", InputSchema::empty()),
        Panics,
    );
    dispatcher.register(
        ToolDescriptor::new("slow.tool", "Never finishes", InputSchema::empty()).dangerous(),
        Stalls,
    );
    dispatcher.register_context(
        ContextDescriptor::new("selection", "Current selection", ContextFormat::Json),
        || async { Ok::<Value, ToolError>(json!({"nodes": ["1:2", "1:3"]})) },
    );
    dispatcher.register_context(
        ContextDescriptor::new("document", "Open document", ContextFormat::StructuredText),
        || async { Err::<Value, ToolError>(ToolError::new("no document open")) },
    );
    dispatcher
}

pub fn tool_names() -> Vec<&'static str> {
    vec!["echo.tool", "sum", "fail.tool", "panic.tool", "slow.tool"]
}
