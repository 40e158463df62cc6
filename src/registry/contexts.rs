//! Context descriptors, providers and the context registry.
//!
//! A context is a named, read-only data source with no arguments: the current
//! Figma selection, the open browser tab, a project summary. It is the
//! zero-argument sibling of a tool.

use super::tools::ToolError;
use super::{read_lock, write_lock};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// How a context's payload is formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextFormat {
    StructuredText,
    Json,
    Plain,
}

/// Name, description and format of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextDescriptor {
    name: String,
    description: String,
    format: ContextFormat,
}

impl ContextDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        format: ContextFormat,
    ) -> Self {
        ContextDescriptor {
            name: name.into(),
            description: description.into(),
            format,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn format(&self) -> ContextFormat {
        self.format
    }
}

/// Supplies a context's current value.
///
/// Any `Fn() -> impl Future<Output = Result<Value, ToolError>>` closure is a
/// provider.
#[async_trait::async_trait]
pub trait ContextProvider: Send + Sync + 'static {
    async fn fetch(&self) -> Result<Value, ToolError>;
}

#[async_trait::async_trait]
impl<F, Fut> ContextProvider for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<Value, ToolError> {
        (self)().await
    }
}

/// A registered context.
#[derive(Clone)]
pub struct ContextEntry {
    pub descriptor: Arc<ContextDescriptor>,
    pub provider: Arc<dyn ContextProvider>,
}

impl std::fmt::Debug for ContextEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Name → context mapping, kept in registration order.
#[derive(Default)]
pub struct ContextRegistry {
    contexts: RwLock<Vec<ContextEntry>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        ContextRegistry::default()
    }

    /// Registers a context. Last registration under a name wins.
    pub fn register<P: ContextProvider>(&self, descriptor: ContextDescriptor, provider: P) {
        let entry = ContextEntry {
            descriptor: Arc::new(descriptor),
            provider: Arc::new(provider),
        };
        let mut contexts = write_lock(&self.contexts);
        match contexts
            .iter_mut()
            .find(|c| c.descriptor.name() == entry.descriptor.name())
        {
            Some(existing) => {
                logwise::warn_sync!(
                    "context {name} registered twice; the newer registration wins",
                    name = logwise::privacy::LogIt(entry.descriptor.name())
                );
                *existing = entry;
            }
            None => contexts.push(entry),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ContextEntry> {
        read_lock(&self.contexts)
            .iter()
            .find(|c| c.descriptor.name() == name)
            .cloned()
    }

    pub fn all_names(&self) -> Vec<String> {
        read_lock(&self.contexts)
            .iter()
            .map(|c| c.descriptor.name().to_string())
            .collect()
    }

    pub fn all_descriptors(&self) -> Vec<Arc<ContextDescriptor>> {
        read_lock(&self.contexts)
            .iter()
            .map(|c| c.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.contexts).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.contexts).is_empty()
    }
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("contexts", &self.all_names())
            .finish()
    }
}
