//! Tool descriptors, handlers and the tool registry.
//!
//! A tool is a named, schema-described unit of functionality. Registering a
//! tool pairs a [`ToolDescriptor`] (name, description, ordered argument
//! schema) with a [`ToolHandler`] that performs the work.
//!
//! # Architecture
//!
//! The argument schema is an *ordered* list of [`Argument`]s. The order is
//! significant: the compact wire format passes arguments positionally, and the
//! dispatcher maps position `i` onto the `i`-th declared argument.
//!
//! Handlers are asynchronous and may suspend on external I/O. Any
//! `Fn(Map<String, Value>) -> impl Future<Output = Result<Value, ToolError>>`
//! closure is a handler, so most tools never need a dedicated type.
//!
//! # Examples
//!
//! ## Registering a closure
//!
//! ```
//! use aicf_rpc::registry::tools::{Argument, InputSchema, ToolDescriptor, ToolError, ToolRegistry};
//! use serde_json::{Map, Value, json};
//!
//! let registry = ToolRegistry::new();
//! registry.register(
//!     ToolDescriptor::new(
//!         "sum",
//!         "Adds two numbers",
//!         InputSchema::new(vec![
//!             Argument::new("a", "number", "First operand", true),
//!             Argument::new("b", "number", "Second operand", true),
//!         ]),
//!     ),
//!     |args: Map<String, Value>| async move {
//!         let a = args.get("a").and_then(Value::as_i64).ok_or_else(|| ToolError::new("missing a"))?;
//!         let b = args.get("b").and_then(Value::as_i64).ok_or_else(|| ToolError::new("missing b"))?;
//!         Ok::<Value, ToolError>(json!(a + b))
//!     },
//! );
//! assert_eq!(registry.all_names(), vec!["sum".to_string()]);
//! ```
//!
//! ## Implementing a handler type
//!
//! ```
//! use aicf_rpc::registry::tools::{ToolError, ToolHandler};
//! use serde_json::{Map, Value};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl ToolHandler for Echo {
//!     async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
//!         Ok(Value::Object(arguments))
//!     }
//! }
//! ```

use super::{read_lock, write_lock};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::{Arc, RwLock};

/// A single declared argument of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    name: String,
    /// The declared type ("string", "number", "boolean", "object", ...).
    r#type: String,
    description: String,
    required: bool,
}

impl Argument {
    /// Creates a new argument specification.
    ///
    /// # Examples
    ///
    /// ```
    /// use aicf_rpc::registry::tools::Argument;
    ///
    /// let url = Argument::new("url", "string", "Page to open", true);
    /// assert_eq!(url.name(), "url");
    /// assert!(url.required());
    /// ```
    pub fn new(
        name: impl Into<String>,
        r#type: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
            description: description.into(),
            required,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn r#type(&self) -> &str {
        &self.r#type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn required(&self) -> bool {
        self.required
    }
}

/// The ordered argument schema of a tool.
///
/// Serializes as a JSON Schema object whose `properties` appear in
/// declaration order:
///
/// ```
/// use aicf_rpc::registry::tools::{Argument, InputSchema};
///
/// let schema = InputSchema::new(vec![
///     Argument::new("zeta", "string", "Last letter", true),
///     Argument::new("alpha", "number", "First letter", false),
/// ]);
/// let json = serde_json::to_string(&schema).unwrap();
/// assert!(json.find("zeta").unwrap() < json.find("alpha").unwrap());
/// assert!(json.contains(r#""required":["zeta"]"#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSchema {
    arguments: Vec<Argument>,
}

impl InputSchema {
    /// Creates a schema from arguments in positional order.
    pub fn new<A: IntoIterator<Item = Argument>>(arguments: A) -> Self {
        InputSchema {
            arguments: arguments.into_iter().collect(),
        }
    }

    /// A schema with no arguments.
    pub fn empty() -> Self {
        InputSchema::default()
    }

    /// The declared arguments, in positional order.
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// The declared argument names, in positional order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().map(|a| a.name.as_str())
    }
}

impl Serialize for InputSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Properties<'a>(&'a [Argument]);
        impl Serialize for Properties<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for argument in self.0 {
                    map.serialize_entry(
                        &argument.name,
                        &PropertySchema {
                            r#type: &argument.r#type,
                            description: &argument.description,
                        },
                    )?;
                }
                map.end()
            }
        }

        #[derive(Serialize)]
        struct PropertySchema<'a> {
            r#type: &'a str,
            description: &'a str,
        }

        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &Properties(&self.arguments))?;
        map.serialize_entry("required", &required)?;
        map.end()
    }
}

/// Everything the registry knows about a tool besides its handler.
///
/// Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: InputSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dangerous: bool,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        ToolDescriptor {
            name: name.into(),
            description: description.into(),
            input_schema,
            category: None,
            dangerous: false,
        }
    }

    /// Tags the tool with a category, e.g. `"figma"` or `"browser"`.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Flags the tool as having destructive side effects.
    pub fn dangerous(mut self) -> Self {
        self.dangerous = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &InputSchema {
        &self.input_schema
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn is_dangerous(&self) -> bool {
        self.dangerous
    }

    /// The flat `(argument, type)` view returned by `INFO`.
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self
                .input_schema
                .arguments()
                .iter()
                .map(|a| ArgumentInfo {
                    name: a.name.clone(),
                    r#type: a.r#type.clone(),
                })
                .collect(),
        }
    }
}

/// Name and type of one argument, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentInfo {
    pub name: String,
    pub r#type: String,
}

/// A tool's name, description and flattened argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub arguments: Vec<ArgumentInfo>,
}

/// The failure a handler reports.
///
/// The dispatcher wraps it into
/// [`Error::ToolExecution`](crate::Error::ToolExecution) (or
/// [`Error::ContextNotAvailable`](crate::Error::ContextNotAvailable) for a
/// context provider), preserving the message.
///
/// ```
/// use aicf_rpc::registry::tools::ToolError;
/// use serde_json::json;
///
/// let error = ToolError::new("node not found").with_data(json!({"nodeId": "1:2"}));
/// assert_eq!(error.to_string(), "node not found");
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    message: String,
    data: Option<Value>,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        ToolError {
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured detail, surfaced as JSON-RPC `error.data`.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub(crate) fn into_parts(self) -> (String, Option<Value>) {
        (self.message, self.data)
    }
}

impl From<String> for ToolError {
    fn from(value: String) -> Self {
        ToolError::new(value)
    }
}

impl From<&str> for ToolError {
    fn from(value: &str) -> Self {
        ToolError::new(value)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(value: serde_json::Error) -> Self {
        ToolError::new(value.to_string())
    }
}

/// The implementation behind a tool.
///
/// Handlers must be `Send + Sync` as they are invoked concurrently from
/// runtime worker threads.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    /// Runs the tool with its named arguments.
    ///
    /// Optional arguments that the caller did not supply are absent from the
    /// map; they are never defaulted to `null` or `""`.
    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;
}

#[async_trait::async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        (self)(arguments).await
    }
}

/// A registered tool: its descriptor and a shared handle to its handler.
#[derive(Clone)]
pub struct ToolEntry {
    pub descriptor: Arc<ToolDescriptor>,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Name → tool mapping, kept in registration order.
///
/// Registration normally happens once at startup; the list is behind a
/// `RwLock` so tools registered later are safe against concurrent lookups.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<ToolEntry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    /// Registers a tool.
    ///
    /// Re-registering an existing name replaces the descriptor and handler
    /// but keeps the tool's original position in the listing.
    pub fn register<H: ToolHandler>(&self, descriptor: ToolDescriptor, handler: H) {
        let entry = ToolEntry {
            descriptor: Arc::new(descriptor),
            handler: Arc::new(handler),
        };
        let mut tools = write_lock(&self.tools);
        match tools
            .iter_mut()
            .find(|t| t.descriptor.name() == entry.descriptor.name())
        {
            Some(existing) => {
                logwise::warn_sync!(
                    "tool {name} registered twice; the newer registration wins",
                    name = logwise::privacy::LogIt(entry.descriptor.name())
                );
                *existing = entry;
            }
            None => {
                logwise::info_sync!(
                    "registered tool {name}",
                    name = logwise::privacy::LogIt(entry.descriptor.name())
                );
                tools.push(entry);
            }
        }
    }

    /// Finds a tool by name.
    pub fn lookup(&self, name: &str) -> Option<ToolEntry> {
        read_lock(&self.tools)
            .iter()
            .find(|t| t.descriptor.name() == name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        read_lock(&self.tools)
            .iter()
            .any(|t| t.descriptor.name() == name)
    }

    /// Snapshot of tool names in registration order.
    pub fn all_names(&self) -> Vec<String> {
        read_lock(&self.tools)
            .iter()
            .map(|t| t.descriptor.name().to_string())
            .collect()
    }

    /// Snapshot of tool descriptors in registration order.
    pub fn all_descriptors(&self) -> Vec<Arc<ToolDescriptor>> {
        read_lock(&self.tools)
            .iter()
            .map(|t| t.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.tools).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.tools).is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.all_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: Value) -> impl ToolHandler {
        move |_args: Map<String, Value>| {
            let value = value.clone();
            async move { Ok::<Value, ToolError>(value) }
        }
    }

    #[test]
    fn names_are_listed_in_registration_order() {
        let registry = ToolRegistry::new();
        for name in ["figma.get_node", "browser.open", "figma.export"] {
            registry.register(
                ToolDescriptor::new(name, "", InputSchema::empty()),
                constant(json!(name)),
            );
        }
        assert_eq!(
            registry.all_names(),
            vec!["figma.get_node", "browser.open", "figma.export"]
        );
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("browser.open"));
        assert!(!registry.contains("browser.close"));
    }

    #[tokio::test]
    async fn re_registration_replaces_in_place() {
        let registry = ToolRegistry::new();
        registry.register(
            ToolDescriptor::new("a", "first", InputSchema::empty()),
            constant(json!(1)),
        );
        registry.register(
            ToolDescriptor::new("b", "", InputSchema::empty()),
            constant(json!(2)),
        );
        registry.register(
            ToolDescriptor::new("a", "second", InputSchema::empty()),
            constant(json!(3)),
        );

        assert_eq!(registry.all_names(), vec!["a", "b"]);
        let entry = registry.lookup("a").unwrap();
        assert_eq!(entry.descriptor.description(), "second");
        assert_eq!(entry.handler.call(Map::new()).await.unwrap(), json!(3));
    }

    #[test]
    fn lookup_of_unknown_tool_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.lookup("nope").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn descriptor_serialization_keeps_schema_order() {
        let descriptor = ToolDescriptor::new(
            "figma.set_text",
            "Sets the text of a node",
            InputSchema::new(vec![
                Argument::new("nodeId", "string", "Target node", true),
                Argument::new("text", "string", "New text", true),
                Argument::new("fontSize", "number", "Optional size", false),
            ]),
        )
        .with_category("figma")
        .dangerous();

        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"name":"figma.set_text","description":"Sets the text of a node","#,
                r#""inputSchema":{"type":"object","properties":{"#,
                r#""nodeId":{"type":"string","description":"Target node"},"#,
                r#""text":{"type":"string","description":"New text"},"#,
                r#""fontSize":{"type":"number","description":"Optional size"}},"#,
                r#""required":["nodeId","text"]},"category":"figma","dangerous":true}"#
            )
        );
    }

    #[test]
    fn info_flattens_arguments_in_order() {
        let descriptor = ToolDescriptor::new(
            "browser.click",
            "Clicks an element",
            InputSchema::new(vec![
                Argument::new("selector", "string", "", true),
                Argument::new("button", "string", "", false),
            ]),
        );
        let info = descriptor.info();
        let pairs: Vec<(&str, &str)> = info
            .arguments
            .iter()
            .map(|a| (a.name.as_str(), a.r#type.as_str()))
            .collect();
        assert_eq!(pairs, vec![("selector", "string"), ("button", "string")]);
        assert_eq!(
            descriptor.input_schema().property_names().collect::<Vec<_>>(),
            vec!["selector", "button"]
        );
    }
}
