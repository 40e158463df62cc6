//! Routing decoded requests to handshake, capability, tool and context logic.
//!
//! The [`Dispatcher`] owns the registries and the session store. It is
//! transport-agnostic: a transport reads a line or a JSON document, hands it to
//! [`Dispatcher::handle_compact`] or [`Dispatcher::handle_json_rpc`], and
//! writes back the returned string. Every call produces exactly one response;
//! handler errors, panics and timeouts are all turned into failure responses.
//!
//! Handlers run as tokio tasks, so requests must be dispatched from within a
//! tokio runtime.
//!
//! # Examples
//!
//! ```
//! use aicf_rpc::registry::tools::{Argument, InputSchema, ToolDescriptor, ToolError};
//! use aicf_rpc::{Dispatcher, DispatcherConfig};
//! use serde_json::{Map, Value, json};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::new(DispatcherConfig::default());
//! dispatcher.register(
//!     ToolDescriptor::new(
//!         "greet",
//!         "Greets someone",
//!         InputSchema::new(vec![Argument::new("name", "string", "Who to greet", true)]),
//!     ),
//!     |args: Map<String, Value>| async move {
//!         let name = args.get("name").and_then(Value::as_str).unwrap_or("stranger").to_string();
//!         Ok::<Value, ToolError>(json!(format!("hello, {name}")))
//!     },
//! );
//!
//! assert_eq!(dispatcher.handle_compact("CALL|greet|Ada").await, "OK|hello, Ada");
//! assert_eq!(dispatcher.handle_compact("LIST").await, "TOOLS|greet");
//! # }
//! ```

use crate::canonical::{
    Arguments, Capability, HandshakeResult, Operation, Payload, Request, Response, ServerInfo,
};
use crate::config::{ConfigError, DispatcherConfig, PROTOCOL_NAME, PROTOCOL_VERSION};
use crate::registry::contexts::{ContextDescriptor, ContextProvider, ContextRegistry};
use crate::registry::tools::{InputSchema, ToolDescriptor, ToolHandler, ToolRegistry};
use crate::session::{DEFAULT_SESSION_TTL, SessionStore};
use crate::{Error, jrpc, wire};
use serde_json::{Map, Value};
use std::any::Any;
use std::future::Future;
use std::time::Duration;

/// Maps invocation arguments onto the named form handlers receive.
///
/// Named arguments pass through unchanged. Positional argument `i` is bound to
/// the `i`-th declared property; surplus positional arguments are dropped,
/// missing trailing ones and `undefined` ones are simply absent.
///
/// ```
/// use aicf_rpc::canonical::Arguments;
/// use aicf_rpc::dispatch::map_arguments;
/// use aicf_rpc::registry::tools::{Argument, InputSchema};
/// use serde_json::json;
///
/// let schema = InputSchema::new(vec![
///     Argument::new("msg", "string", "", true),
///     Argument::new("count", "number", "", false),
/// ]);
/// let mapped = map_arguments(&schema, Arguments::positional([Some(json!("hi")), None, Some(json!(1))]));
/// assert_eq!(serde_json::Value::Object(mapped), json!({"msg": "hi"}));
/// ```
pub fn map_arguments(schema: &InputSchema, arguments: Arguments) -> Map<String, Value> {
    match arguments {
        Arguments::Named(named) => named,
        Arguments::Positional(values) => schema
            .property_names()
            .zip(values)
            .filter_map(|(name, argument)| argument.value.map(|value| (name.to_string(), value)))
            .collect(),
    }
}

/// How a supervised task ended.
enum Completion<T> {
    Finished(T),
    /// The task panicked or was cancelled; carries the panic message.
    Crashed(String),
    TimedOut(Duration),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `future` as its own task, bounded by `bound`.
///
/// On timeout the task is detached, not aborted: it keeps running and its
/// eventual result is discarded.
async fn supervise<F>(future: F, bound: Option<Duration>) -> Completion<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task = tokio::spawn(future);
    let joined = match bound {
        Some(after) => match tokio::time::timeout(after, task).await {
            Ok(joined) => joined,
            Err(_) => return Completion::TimedOut(after),
        },
        None => task.await,
    };
    match joined {
        Ok(output) => Completion::Finished(output),
        Err(e) if e.is_panic() => Completion::Crashed(panic_message(e.into_panic())),
        Err(e) => Completion::Crashed(e.to_string()),
    }
}

/// Routes requests to the registered tools and contexts.
///
/// # Panics
///
/// [`dispatch`](Dispatcher::dispatch) and the `handle_*` methods spawn tokio
/// tasks and panic when awaited outside a tokio runtime. Inside a runtime they
/// never panic, whatever the handlers do.
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatcherConfig,
    tools: ToolRegistry,
    contexts: ContextRegistry,
    sessions: SessionStore,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new(DispatcherConfig::default())
    }
}

impl Dispatcher {
    /// Creates a dispatcher with empty registries.
    ///
    /// A zero session lifetime would expire every session as it is created;
    /// it is replaced with [`DEFAULT_SESSION_TTL`].
    pub fn new(mut config: DispatcherConfig) -> Self {
        if let Err(e @ ConfigError::ZeroSessionTtl) = config.validate() {
            logwise::warn_sync!(
                "{error}; using the default session lifetime",
                error = logwise::privacy::LogIt(&e)
            );
            config.session_ttl_ms = DEFAULT_SESSION_TTL.as_millis() as u64;
        }
        let sessions = SessionStore::new(config.session_ttl());
        Dispatcher {
            config,
            tools: ToolRegistry::new(),
            contexts: ContextRegistry::new(),
            sessions,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Registers a tool. See [`ToolRegistry::register`].
    pub fn register<H: ToolHandler>(&self, descriptor: ToolDescriptor, handler: H) {
        self.tools.register(descriptor, handler);
    }

    /// Registers a context. See [`ContextRegistry::register`].
    pub fn register_context<P: ContextProvider>(&self, descriptor: ContextDescriptor, provider: P) {
        self.contexts.register(descriptor, provider);
    }

    /// Removes expired sessions, returning how many were removed.
    pub fn sweep_sessions(&self) -> usize {
        self.sessions.sweep_expired()
    }

    /// Executes one decoded request.
    ///
    /// Never fails: every failure is reported inside the returned response,
    /// which echoes the request id. Must run inside a tokio runtime.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { id, operation } = request;
        let outcome = match operation {
            Operation::Handshake { client } => Ok(self.handshake(client)),
            Operation::ListCapabilities => Ok(self.list_capabilities()),
            Operation::InvokeTool {
                tool,
                arguments,
                timeout,
            } => self.invoke_tool(tool, arguments, timeout).await,
            Operation::GetToolInfo { tool } => self.tool_info(&tool),
            Operation::GetContext { context } => self.get_context(context).await,
        };
        Response { id, outcome }
    }

    /// Decodes a compact line, dispatches it and encodes the response.
    ///
    /// Undecodable lines produce an `ERR|400|...` response. Must run inside a
    /// tokio runtime.
    pub async fn handle_compact(&self, line: &str) -> String {
        match wire::decode_request(line) {
            Ok(request) => wire::encode_response(&self.dispatch(request).await),
            Err(e) => {
                logwise::warn_sync!(
                    "rejected compact request: {error}",
                    error = logwise::privacy::LogIt(&e)
                );
                wire::encode_failure(&e.into())
            }
        }
    }

    /// Decodes a JSON-RPC request, dispatches it and encodes the response.
    ///
    /// Must run inside a tokio runtime.
    pub async fn handle_json_rpc(&self, text: &str) -> String {
        let request = jrpc::decode(text).and_then(jrpc::Request::into_canonical);
        let response = match request {
            Ok(request) => self.dispatch(request).await,
            Err(rejection) => {
                logwise::warn_sync!(
                    "rejected JSON-RPC request: {error}",
                    error = logwise::privacy::LogIt(&rejection.error)
                );
                rejection.into_response()
            }
        };
        jrpc::encode_response(&response)
    }

    fn handshake(&self, client: Option<Value>) -> Payload {
        let session = self.sessions.create();
        logwise::info_sync!(
            "handshake from {client}; opened session {session}",
            client = logwise::privacy::LogIt(&client),
            session = logwise::privacy::LogIt(session.id())
        );
        Payload::Handshake(HandshakeResult {
            server: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
                protocol: format!("{PROTOCOL_NAME}/{PROTOCOL_VERSION}"),
            },
            session,
        })
    }

    fn list_capabilities(&self) -> Payload {
        let tools = self.tools.all_descriptors().into_iter().map(Capability::Tool);
        let contexts = self
            .contexts
            .all_descriptors()
            .into_iter()
            .map(Capability::Context);
        Payload::Capabilities(tools.chain(contexts).collect())
    }

    async fn invoke_tool(
        &self,
        tool: String,
        arguments: Arguments,
        timeout: Option<Duration>,
    ) -> Result<Payload, Error> {
        let entry = self
            .tools
            .lookup(&tool)
            .ok_or_else(|| Error::ToolNotFound(tool.clone()))?;
        let arguments = map_arguments(entry.descriptor.input_schema(), arguments);
        let bound = timeout.or_else(|| self.config.default_timeout());
        let handler = entry.handler;

        match supervise(async move { handler.call(arguments).await }, bound).await {
            Completion::Finished(Ok(value)) => Ok(Payload::Value(value)),
            Completion::Finished(Err(e)) => {
                logwise::warn_sync!(
                    "tool {tool} failed: {error}",
                    tool = logwise::privacy::LogIt(&tool),
                    error = logwise::privacy::LogIt(&e)
                );
                let (message, data) = e.into_parts();
                Err(Error::ToolExecution {
                    tool,
                    message,
                    data,
                })
            }
            Completion::Crashed(message) => {
                logwise::error_sync!(
                    "tool {tool} panicked: {message}",
                    tool = logwise::privacy::LogIt(&tool),
                    message = logwise::privacy::LogIt(&message)
                );
                Err(Error::ToolExecution {
                    tool,
                    message: format!("handler panicked: {message}"),
                    data: None,
                })
            }
            Completion::TimedOut(after) => {
                logwise::warn_sync!(
                    "tool {tool} timed out after {millis}ms",
                    tool = logwise::privacy::LogIt(&tool),
                    millis = logwise::privacy::LogIt(&after.as_millis())
                );
                Err(Error::Timeout { tool, after })
            }
        }
    }

    fn tool_info(&self, tool: &str) -> Result<Payload, Error> {
        self.tools
            .lookup(tool)
            .map(|entry| Payload::ToolInfo(entry.descriptor.info()))
            .ok_or_else(|| Error::ToolNotFound(tool.to_string()))
    }

    async fn get_context(&self, context: String) -> Result<Payload, Error> {
        let Some(entry) = self.contexts.lookup(&context) else {
            return Err(Error::ContextNotAvailable {
                name: context,
                cause: None,
            });
        };
        let provider = entry.provider;
        let cause = match supervise(
            async move { provider.fetch().await },
            self.config.default_timeout(),
        )
        .await
        {
            Completion::Finished(Ok(value)) => return Ok(Payload::Value(value)),
            Completion::Finished(Err(e)) => e.message().to_string(),
            Completion::Crashed(message) => format!("provider panicked: {message}"),
            Completion::TimedOut(after) => format!("timed out after {}ms", after.as_millis()),
        };
        logwise::warn_sync!(
            "context {context} unavailable: {cause}",
            context = logwise::privacy::LogIt(&context),
            cause = logwise::privacy::LogIt(&cause)
        );
        Err(Error::ContextNotAvailable {
            name: context,
            cause: Some(cause),
        })
    }
}
