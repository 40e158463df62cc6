//! The codec-independent request and response model.
//!
//! Both [`wire`](crate::wire) and [`jrpc`](crate::jrpc) decode into a
//! [`Request`] and encode from a [`Response`]; the
//! [`Dispatcher`](crate::Dispatcher) only ever sees these types.

use crate::Error;
use crate::registry::contexts::ContextDescriptor;
use crate::registry::tools::{ToolDescriptor, ToolInfo};
use crate::session::Session;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// One positional argument.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalArgument {
    /// The typed value. `None` marks an absent (`undefined`) argument: its
    /// position is consumed but no property is produced for it.
    pub value: Option<Value>,
    /// The unescaped field text the value was inferred from, when the argument
    /// came off a compact line. Re-encoding writes this text back verbatim.
    pub source: Option<String>,
}

impl PositionalArgument {
    /// An argument with no source text.
    pub fn new(value: Option<Value>) -> Self {
        PositionalArgument {
            value,
            source: None,
        }
    }
}

impl From<Option<Value>> for PositionalArgument {
    fn from(value: Option<Value>) -> Self {
        PositionalArgument::new(value)
    }
}

impl From<Value> for PositionalArgument {
    fn from(value: Value) -> Self {
        PositionalArgument::new(Some(value))
    }
}

/// Arguments to a tool invocation, as they arrived on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// An ordered list, as produced by the compact codec.
    Positional(Vec<PositionalArgument>),
    /// A named-arguments object, used unchanged.
    Named(Map<String, Value>),
}

impl Default for Arguments {
    fn default() -> Self {
        Arguments::Named(Map::new())
    }
}

impl Arguments {
    /// Positional arguments without source text.
    ///
    /// ```
    /// use aicf_rpc::canonical::Arguments;
    /// use serde_json::json;
    ///
    /// let arguments = Arguments::positional([Some(json!(1)), None]);
    /// assert_eq!(arguments.positional_values(), Some(vec![Some(json!(1)), None]));
    /// ```
    pub fn positional<I, A>(arguments: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<PositionalArgument>,
    {
        Arguments::Positional(arguments.into_iter().map(Into::into).collect())
    }

    /// The typed values of positional arguments; `None` for named arguments.
    pub fn positional_values(&self) -> Option<Vec<Option<Value>>> {
        match self {
            Arguments::Positional(arguments) => {
                Some(arguments.iter().map(|a| a.value.clone()).collect())
            }
            Arguments::Named(_) => None,
        }
    }
}

/// The closed set of operations the dispatcher routes.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Handshake {
        /// Client metadata, captured for logging only.
        client: Option<Value>,
    },
    ListCapabilities,
    InvokeTool {
        tool: String,
        arguments: Arguments,
        /// Per-invocation bound; falls back to the configured default.
        timeout: Option<Duration>,
    },
    GetToolInfo {
        tool: String,
    },
    GetContext {
        context: String,
    },
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The request id to echo; `Value::Null` for the compact format.
    pub id: Value,
    pub operation: Operation,
}

impl Request {
    pub fn new(id: Value, operation: Operation) -> Self {
        Request { id, operation }
    }
}

/// Server identity returned from a handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub protocol: String,
}

/// The payload of a successful handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandshakeResult {
    pub server: ServerInfo,
    pub session: Session,
}

/// One entry of the capability list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Capability {
    Tool(Arc<ToolDescriptor>),
    Context(Arc<ContextDescriptor>),
}

impl Capability {
    pub fn name(&self) -> &str {
        match self {
            Capability::Tool(tool) => tool.name(),
            Capability::Context(context) => context.name(),
        }
    }
}

/// What a successful operation produced.
///
/// Serializes untagged, so a JSON-RPC `result` is exactly the inner value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// A value produced by a tool handler or context provider.
    Value(Value),
    Handshake(HandshakeResult),
    Capabilities(Vec<Capability>),
    ToolInfo(ToolInfo),
}

/// The outcome of a request.
///
/// Success and failure are a `Result`, so a response can never carry both a
/// payload and an error, or neither.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: Value,
    pub outcome: Result<Payload, Error>,
}

impl Response {
    pub fn success(id: Value, payload: Payload) -> Self {
        Response {
            id,
            outcome: Ok(payload),
        }
    }

    pub fn failure(id: Value, error: Error) -> Self {
        Response {
            id,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
