//! The failure taxonomy shared by both wire formats.
//!
//! Every failed [`Response`](crate::canonical::Response) carries exactly one
//! [`Error`]. The dispatcher never lets anything else escape: handler errors,
//! handler panics, timeouts and serialization problems are all converted into
//! one of these variants before a codec sees them.
//!
//! Each variant knows its numeric code in both wire formats:
//!
//! | variant                        | compact | JSON-RPC |
//! |--------------------------------|--------:|---------:|
//! | [`Error::Parse`]               | 400     | -32700   |
//! | [`Error::InvalidRequest`]      | 400     | -32600   |
//! | [`Error::MethodNotFound`]      | 404     | -32601   |
//! | [`Error::InvalidParams`]       | 400     | -32602   |
//! | [`Error::ToolNotFound`]        | 404     | -32001   |
//! | [`Error::ContextNotAvailable`] | 404     | -32003   |
//! | [`Error::ToolExecution`]       | 500     | -32002   |
//! | [`Error::Timeout`]             | 500     | -32002   |
//! | [`Error::Internal`]            | 500     | -32603   |
//!
//! # Examples
//!
//! ```
//! use aicf_rpc::Error;
//!
//! let error = Error::ToolNotFound("unknown.tool".to_string());
//! assert_eq!(error.to_string(), "Tool not found: unknown.tool");
//! assert_eq!(error.compact_code(), 404);
//! assert_eq!(error.rpc_code(), -32001);
//! ```

use serde_json::{Value, json};
use std::time::Duration;

/// Compact code for malformed input.
pub const COMPACT_BAD_REQUEST: u16 = 400;
/// Compact code for a missing tool, context or method.
pub const COMPACT_NOT_FOUND: u16 = 404;
/// Compact code for execution failures and internal errors.
pub const COMPACT_EXECUTION_FAILED: u16 = 500;

/// JSON-RPC code for a tool that is not registered.
pub const RPC_TOOL_NOT_FOUND: i32 = -32001;
/// JSON-RPC code for a handler that failed, panicked or timed out.
pub const RPC_TOOL_EXECUTION_FAILED: i32 = -32002;
/// JSON-RPC code for a context that is missing or whose provider failed.
pub const RPC_CONTEXT_NOT_AVAILABLE: i32 = -32003;

/// A failed outcome of any request, in either wire format.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The input did not match the wire grammar, or was not JSON at all.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The JSON-RPC envelope was well-formed JSON but not a valid request.
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    /// The JSON-RPC method is not one of the routed methods.
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    /// The method exists but its params are missing or ill-typed.
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    /// No tool is registered under this name.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    /// No context is registered under this name, or its provider failed.
    #[error("Context not available: {name}")]
    ContextNotAvailable {
        name: String,
        /// The provider's failure, when there was one.
        cause: Option<String>,
    },
    /// The tool handler returned an error or panicked.
    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution {
        tool: String,
        message: String,
        /// Structured detail supplied by the handler.
        data: Option<Value>,
    },
    /// The tool handler did not finish within its time bound.
    #[error("Tool execution failed: {tool}: timed out after {millis}ms", millis = .after.as_millis())]
    Timeout { tool: String, after: Duration },
    /// Anything the categories above do not anticipate.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The numeric code written after `ERR|` in the compact format.
    pub fn compact_code(&self) -> u16 {
        match self {
            Error::Parse(_) | Error::InvalidRequest(_) | Error::InvalidParams(_) => {
                COMPACT_BAD_REQUEST
            }
            Error::MethodNotFound(_)
            | Error::ToolNotFound(_)
            | Error::ContextNotAvailable { .. } => COMPACT_NOT_FOUND,
            Error::ToolExecution { .. } | Error::Timeout { .. } | Error::Internal(_) => {
                COMPACT_EXECUTION_FAILED
            }
        }
    }

    /// The `error.code` of a JSON-RPC response.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Error::Parse(_) => -32700,
            Error::InvalidRequest(_) => -32600,
            Error::MethodNotFound(_) => -32601,
            Error::InvalidParams(_) => -32602,
            Error::ToolNotFound(_) => RPC_TOOL_NOT_FOUND,
            Error::ContextNotAvailable { .. } => RPC_CONTEXT_NOT_AVAILABLE,
            Error::ToolExecution { .. } | Error::Timeout { .. } => RPC_TOOL_EXECUTION_FAILED,
            Error::Internal(_) => -32603,
        }
    }

    /// The optional `error.data` of a JSON-RPC response.
    pub fn data(&self) -> Option<Value> {
        match self {
            Error::ContextNotAvailable {
                name,
                cause: Some(cause),
            } => Some(json!({ "context": name, "cause": cause })),
            Error::ToolExecution { tool, data, .. } => match data {
                Some(data) => Some(json!({ "tool": tool, "details": data })),
                None => Some(json!({ "tool": tool })),
            },
            Error::Timeout { tool, after } => {
                Some(json!({ "tool": tool, "timeoutMs": after.as_millis() as u64 }))
            }
            _ => None,
        }
    }
}
