//! The JSON-RPC 2.0 envelope.
//!
//! This is the structured sibling of the compact [`wire`](crate::wire) format.
//! A request is a JSON object following the
//! [JSON-RPC 2.0 specification](https://www.jsonrpc.org/specification), with
//! one of four fixed methods:
//!
//! | method            | params                                                   |
//! |-------------------|----------------------------------------------------------|
//! | `handshake`       | `{client?: any}`                                         |
//! | `capability-list` | none                                                     |
//! | `tool-invoke`     | `{tool: string, arguments?: object\|array, timeoutMs?: number}` |
//! | `context-get`     | `{context: string}`                                      |
//!
//! # Overview
//!
//! Decoding happens in two steps. [`decode`] validates the envelope itself
//! (`jsonrpc`, `id`, `method`) and yields a [`Request`]; then
//! [`Request::into_canonical`] resolves the method and its params into a
//! [`canonical::Request`]. Either step can fail with a [`Rejection`], which
//! already knows the id to answer with and can be turned straight into a
//! failure response.
//!
//! Batches and notifications are not supported; a request without an `id` is
//! rejected as an invalid request.
//!
//! # Examples
//!
//! ```
//! use aicf_rpc::canonical::{Arguments, Operation};
//! use aicf_rpc::jrpc;
//! use serde_json::json;
//!
//! let text = r#"{"jsonrpc":"2.0","id":"7","method":"tool-invoke","params":{"tool":"sum","arguments":{"a":2,"b":3}}}"#;
//! let request = jrpc::decode(text).unwrap().into_canonical().unwrap();
//! assert_eq!(request.id, json!("7"));
//! let Operation::InvokeTool { tool, arguments, timeout } = request.operation else { unreachable!() };
//! assert_eq!(tool, "sum");
//! assert!(matches!(arguments, Arguments::Named(_)));
//! assert_eq!(timeout, None);
//! ```
//!
//! ## Rejections
//!
//! ```
//! use aicf_rpc::jrpc;
//!
//! let rejection = jrpc::decode("{not json").unwrap_err();
//! assert!(rejection.id.is_null());
//! let encoded = jrpc::encode_response(&rejection.into_response());
//! assert!(encoded.contains(r#""code":-32700"#));
//! ```

use crate::Error;
use crate::canonical::{self, Arguments, Operation, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// The only protocol version this envelope accepts.
pub const JSONRPC_VERSION: &str = "2.0";

// Written when even a failure envelope cannot be serialized.
const FALLBACK_RESPONSE: &str = r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error: response could not be serialized"}}"#;

/// A validated JSON-RPC 2.0 request envelope.
///
/// Produced by [`decode`]; the method has not been resolved yet.
///
/// ```
/// use aicf_rpc::jrpc::Request;
/// use serde_json::json;
///
/// let request = Request::new("capability-list", None, json!(1));
/// let text = serde_json::to_string(&request).unwrap();
/// assert_eq!(text, r#"{"jsonrpc":"2.0","method":"capability-list","id":1}"#);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    /// The JSON-RPC protocol version (always "2.0")
    pub jsonrpc: String,
    /// The method to invoke
    pub method: String,
    /// Method parameters; an explicit `null` is treated as absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// The request id, a string or a number
    pub id: Value,
}

impl Request {
    /// Creates a 2.0 request.
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Request {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    /// Resolves the method and params into a codec-independent request.
    ///
    /// Fails with `MethodNotFound` for a method outside the fixed table and
    /// with `InvalidParams` when the params do not fit the method.
    ///
    /// ```
    /// use aicf_rpc::canonical::Operation;
    /// use aicf_rpc::jrpc::Request;
    /// use aicf_rpc::Error;
    /// use serde_json::json;
    ///
    /// let request = Request::new("context-get", Some(json!({"context": "selection"})), json!(3));
    /// assert_eq!(
    ///     request.into_canonical().unwrap().operation,
    ///     Operation::GetContext { context: "selection".to_string() }
    /// );
    ///
    /// let rejection = Request::new("tools/list", None, json!(4)).into_canonical().unwrap_err();
    /// assert_eq!(rejection.id, json!(4));
    /// assert_eq!(rejection.error, Error::MethodNotFound("tools/list".to_string()));
    /// ```
    pub fn into_canonical(self) -> Result<canonical::Request, Rejection> {
        let Request {
            method, params, id, ..
        } = self;
        let Some(resolved) = Method::from_name(&method) else {
            return Err(Rejection::new(id, Error::MethodNotFound(method)));
        };
        match operation(resolved, params) {
            Ok(operation) => Ok(canonical::Request::new(id, operation)),
            Err(error) => Err(Rejection::new(id, error)),
        }
    }
}

/// The methods this envelope routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Handshake,
    CapabilityList,
    ToolInvoke,
    ContextGet,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Method> {
        match name {
            "handshake" => Some(Method::Handshake),
            "capability-list" => Some(Method::CapabilityList),
            "tool-invoke" => Some(Method::ToolInvoke),
            "context-get" => Some(Method::ContextGet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Handshake => "handshake",
            Method::CapabilityList => "capability-list",
            Method::ToolInvoke => "tool-invoke",
            Method::ContextGet => "context-get",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolInvokeParams {
    tool: String,
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
struct ContextGetParams {
    context: String,
}

fn required_params<T: serde::de::DeserializeOwned>(
    method: Method,
    params: Option<Value>,
) -> Result<T, Error> {
    let params = params.ok_or_else(|| {
        Error::InvalidParams(format!("{} requires params", method.as_str()))
    })?;
    serde_json::from_value(params).map_err(|e| Error::InvalidParams(e.to_string()))
}

fn arguments(value: Option<Value>) -> Result<Arguments, Error> {
    match value {
        None | Some(Value::Null) => Ok(Arguments::default()),
        Some(Value::Object(named)) => Ok(Arguments::Named(named)),
        Some(Value::Array(positional)) => Ok(Arguments::positional(positional)),
        Some(_) => Err(Error::InvalidParams(
            "arguments must be an object or an array".to_string(),
        )),
    }
}

fn non_empty(field: &str, value: String) -> Result<String, Error> {
    if value.is_empty() {
        Err(Error::InvalidParams(format!("{field} must not be empty")))
    } else {
        Ok(value)
    }
}

fn operation(method: Method, params: Option<Value>) -> Result<Operation, Error> {
    match method {
        Method::Handshake => match params {
            None => Ok(Operation::Handshake { client: None }),
            Some(Value::Object(mut map)) => Ok(Operation::Handshake {
                client: map.remove("client"),
            }),
            Some(_) => Err(Error::InvalidParams(
                "handshake params must be an object".to_string(),
            )),
        },
        Method::CapabilityList => Ok(Operation::ListCapabilities),
        Method::ToolInvoke => {
            let params: ToolInvokeParams = required_params(method, params)?;
            Ok(Operation::InvokeTool {
                tool: non_empty("tool", params.tool)?,
                arguments: arguments(params.arguments)?,
                timeout: params.timeout_ms.map(Duration::from_millis),
            })
        }
        Method::ContextGet => {
            let params: ContextGetParams = required_params(method, params)?;
            Ok(Operation::GetContext {
                context: non_empty("context", params.context)?,
            })
        }
    }
}

/// A request that was refused before it reached the dispatcher.
///
/// Carries the id to answer with: the request's own id when it could be read,
/// `null` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub id: Value,
    pub error: Error,
}

impl Rejection {
    pub fn new(id: Value, error: Error) -> Self {
        Rejection { id, error }
    }

    pub fn into_response(self) -> canonical::Response {
        canonical::Response::failure(self.id, self.error)
    }
}

fn usable_id(id: Option<&Value>) -> Option<Value> {
    match id {
        Some(id @ (Value::String(_) | Value::Number(_))) => Some(id.clone()),
        _ => None,
    }
}

/// Parses and validates a request envelope.
///
/// Unparseable JSON is rejected as a parse error with a `null` id. A JSON
/// value that is not a valid 2.0 request is rejected as an invalid request,
/// answered with its id when that id is usable.
pub fn decode(text: &str) -> Result<Request, Rejection> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Rejection::new(Value::Null, Error::Parse(e.to_string())))?;
    let Value::Object(mut envelope) = value else {
        return Err(Rejection::new(
            Value::Null,
            Error::InvalidRequest("request must be a JSON object".to_string()),
        ));
    };
    let id = usable_id(envelope.get("id"));
    let invalid = |reason: &str| {
        Rejection::new(
            id.clone().unwrap_or(Value::Null),
            Error::InvalidRequest(reason.to_string()),
        )
    };

    if envelope.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(invalid("jsonrpc must be \"2.0\""));
    }
    let Some(request_id) = id.clone() else {
        return Err(invalid("id must be a string or a number"));
    };
    let method = match envelope.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        _ => return Err(invalid("method must be a non-empty string")),
    };
    let params = match envelope.remove("params") {
        None | Some(Value::Null) => None,
        Some(params) => Some(params),
    };
    Ok(Request {
        jsonrpc: JSONRPC_VERSION.to_string(),
        method,
        params,
        id: request_id,
    })
}

/// The wire shape of a JSON-RPC error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&Error> for ErrorObject {
    fn from(error: &Error) -> Self {
        ErrorObject {
            code: error.rpc_code(),
            message: error.to_string(),
            data: error.data(),
        }
    }
}

/// A JSON-RPC 2.0 response envelope.
///
/// Exactly one of `result` and `error` is present.
///
/// ```
/// use aicf_rpc::jrpc::Response;
/// use serde_json::json;
///
/// let response = Response::new(json!(5), json!("7"));
/// assert_eq!(
///     serde_json::to_string(&response).unwrap(),
///     r#"{"jsonrpc":"2.0","id":"7","result":5}"#
/// );
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Response<R = Value> {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl<R> Response<R> {
    pub fn new(result: R, id: Value) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: ErrorObject, id: Value) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Encodes a canonical response as a JSON-RPC envelope.
///
/// Always returns a valid envelope; if the payload cannot be serialized the
/// result is an internal-error envelope instead.
pub fn encode_response(response: &canonical::Response) -> String {
    let envelope: Response<&Payload> = match &response.outcome {
        Ok(payload) => Response::new(payload, response.id.clone()),
        Err(error) => Response::err(error.into(), response.id.clone()),
    };
    match serde_json::to_string(&envelope) {
        Ok(text) => text,
        Err(e) => {
            logwise::error_sync!(
                "failed to serialize a response: {error}",
                error = logwise::privacy::LogIt(&e.to_string())
            );
            let internal = Error::Internal(e.to_string());
            serde_json::to_string(&Response::<Value>::err(
                (&internal).into(),
                response.id.clone(),
            ))
            .unwrap_or_else(|_| FALLBACK_RESPONSE.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejected(text: &str) -> Rejection {
        decode(text).unwrap_err()
    }

    #[test]
    fn parse_errors_have_null_id() {
        let rejection = rejected(r#"{"jsonrpc":"2.0","id":1,"method":"#);
        assert_eq!(rejection.id, Value::Null);
        assert!(matches!(rejection.error, Error::Parse(_)));
    }

    #[test]
    fn envelope_violations_are_invalid_requests() {
        for text in [
            r#"[1,2]"#,
            r#"{"id":1,"method":"handshake"}"#,
            r#"{"jsonrpc":"1.0","id":1,"method":"handshake"}"#,
            r#"{"jsonrpc":"2.0","method":"handshake"}"#,
            r#"{"jsonrpc":"2.0","id":null,"method":"handshake"}"#,
            r#"{"jsonrpc":"2.0","id":{"x":1},"method":"handshake"}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":""}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":7}"#,
        ] {
            let rejection = rejected(text);
            assert!(
                matches!(rejection.error, Error::InvalidRequest(_)),
                "{text} gave {:?}",
                rejection.error
            );
            assert_eq!(rejection.error.rpc_code(), -32600);
        }
    }

    #[test]
    fn invalid_requests_keep_a_usable_id() {
        let rejection = rejected(r#"{"jsonrpc":"1.0","id":"abc","method":"handshake"}"#);
        assert_eq!(rejection.id, json!("abc"));
        let rejection = rejected(r#"{"jsonrpc":"2.0","id":9}"#);
        assert_eq!(rejection.id, json!(9));
    }

    #[test]
    fn null_params_are_absent() {
        let request = decode(r#"{"jsonrpc":"2.0","id":1,"method":"handshake","params":null}"#)
            .unwrap();
        assert_eq!(request.params, None);
        assert_eq!(
            request.into_canonical().unwrap().operation,
            Operation::Handshake { client: None }
        );
    }

    #[test]
    fn handshake_captures_client_metadata() {
        let request = Request::new(
            "handshake",
            Some(json!({"client": {"name": "figma-plugin", "version": "2.1"}})),
            json!(1),
        );
        assert_eq!(
            request.into_canonical().unwrap().operation,
            Operation::Handshake {
                client: Some(json!({"name": "figma-plugin", "version": "2.1"}))
            }
        );
    }

    #[test]
    fn tool_invoke_arguments_by_shape() {
        let invoke = |params: Value| {
            match Request::new("tool-invoke", Some(params), json!(1))
                .into_canonical()
                .map(|r| r.operation)
            {
                Ok(Operation::InvokeTool {
                    arguments, timeout, ..
                }) => Ok((arguments, timeout)),
                Ok(other) => panic!("unexpected operation {other:?}"),
                Err(rejection) => Err(rejection.error),
            }
        };

        let (args, timeout) = invoke(json!({"tool": "t", "arguments": [1, null]})).unwrap();
        assert_eq!(
            args,
            Arguments::positional([Some(json!(1)), Some(Value::Null)])
        );
        assert_eq!(timeout, None);

        let (args, timeout) = invoke(json!({"tool": "t", "timeoutMs": 100})).unwrap();
        assert_eq!(args, Arguments::default());
        assert_eq!(timeout, Some(Duration::from_millis(100)));

        assert!(matches!(
            invoke(json!({"tool": "t", "arguments": "oops"})),
            Err(Error::InvalidParams(_))
        ));
        assert!(matches!(
            invoke(json!({"arguments": {}})),
            Err(Error::InvalidParams(_))
        ));
        assert!(matches!(
            invoke(json!({"tool": ""})),
            Err(Error::InvalidParams(_))
        ));
        assert!(matches!(
            invoke(json!({"tool": "t", "timeoutMs": -5})),
            Err(Error::InvalidParams(_))
        ));
    }

    #[test]
    fn missing_params_are_invalid() {
        let rejection = Request::new("context-get", None, json!(2))
            .into_canonical()
            .unwrap_err();
        assert_eq!(rejection.id, json!(2));
        assert_eq!(rejection.error.rpc_code(), -32602);
    }

    #[test]
    fn failures_encode_code_message_and_data() {
        let response = canonical::Response::failure(
            json!(5),
            Error::ToolExecution {
                tool: "t".to_string(),
                message: "boom".to_string(),
                data: None,
            },
        );
        let encoded: Value = serde_json::from_str(&encode_response(&response)).unwrap();
        assert_eq!(
            encoded,
            json!({
                "jsonrpc": "2.0",
                "id": 5,
                "error": {
                    "code": -32002,
                    "message": "Tool execution failed: t: boom",
                    "data": {"tool": "t"}
                }
            })
        );
    }

    #[test]
    fn null_results_are_still_present() {
        let response = canonical::Response::success(json!(1), Payload::Value(Value::Null));
        assert_eq!(
            encode_response(&response),
            r#"{"jsonrpc":"2.0","id":1,"result":null}"#
        );
    }

    #[test]
    fn fallback_is_valid_json() {
        let value: Value = serde_json::from_str(FALLBACK_RESPONSE).unwrap();
        assert_eq!(value["error"]["code"], -32603);
    }
}
