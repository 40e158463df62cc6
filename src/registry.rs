//! In-memory registries for tools and contexts.
//!
//! The registries are owned by the [`Dispatcher`](crate::Dispatcher) and are
//! written at startup, read on every request. Nothing is persisted; a new
//! process starts with empty registries.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod contexts;
pub mod tools;

pub use contexts::{ContextDescriptor, ContextEntry, ContextFormat, ContextProvider, ContextRegistry};
pub use tools::{
    Argument, ArgumentInfo, InputSchema, ToolDescriptor, ToolEntry, ToolError, ToolHandler,
    ToolInfo, ToolRegistry,
};

// A panic while holding a registry lock cannot leave the Vec half-written,
// so the poisoned data is still usable.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
