//! The compact pipe-delimited wire format.
//!
//! A request or response is a single line of `|`-separated fields. The first
//! field is the command:
//!
//! ```text
//! LIST
//! INFO|<tool>
//! CALL|<tool>[|<arg>]*
//!
//! OK|<payload>
//! ERR|<code>|<message>
//! TOOLS|<name>[|<name>]*
//! TOOL|<name>|<description>[|<arg>:<type>]*
//! ```
//!
//! # Escaping
//!
//! Inside a field `\\` is a backslash, `\|` a literal pipe, `\n` a newline and
//! `\t` a tab. Any other escaped character stands for itself. A trailing
//! unescaped `|` produces one more, empty, field.
//!
//! # Argument types
//!
//! `CALL` arguments are typed after unescaping, first match wins:
//!
//! 1. `{...}` / `[...]` that parses as JSON → that JSON value
//! 2. `-?[0-9]+(\.[0-9]+)?` → a number
//! 3. `true` / `false` → a boolean
//! 4. `null` → null, `undefined` → absent
//! 5. anything else → the string itself
//!
//! # Examples
//!
//! ```
//! use aicf_rpc::canonical::Operation;
//! use aicf_rpc::wire;
//! use serde_json::json;
//!
//! let request = wire::decode_request(r"CALL|figma.rename|1:2|Hello\|World|42").unwrap();
//! let Operation::InvokeTool { tool, arguments, .. } = request.operation else { unreachable!() };
//! assert_eq!(tool, "figma.rename");
//! assert_eq!(
//!     arguments.positional_values(),
//!     Some(vec![Some(json!("1:2")), Some(json!("Hello|World")), Some(json!(42))])
//! );
//! ```

use crate::Error;
use crate::canonical::{
    Arguments, Capability, Operation, Payload, PositionalArgument, Request, Response,
};
use crate::registry::tools::ToolInfo;
use regex::Regex;
use serde_json::{Number, Value};
use std::sync::LazyLock;

/// The field separator.
pub const SEPARATOR: char = '|';

const ESCAPE: char = '\\';

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("numeric pattern compiles"));

/// Request commands of the compact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Call,
    List,
    Info,
}

impl Command {
    pub fn parse(text: &str) -> Option<Command> {
        match text {
            "CALL" => Some(Command::Call),
            "LIST" => Some(Command::List),
            "INFO" => Some(Command::Info),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Call => "CALL",
            Command::List => "LIST",
            Command::Info => "INFO",
        }
    }
}

/// Why a compact request line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{} requires a tool name", .0.as_str())]
    MissingToolName(Command),
}

impl From<ParseError> for Error {
    fn from(value: ParseError) -> Self {
        Error::Parse(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    Escaped,
}

/// Splits a line into unescaped fields.
///
/// Always returns at least one field; the empty string yields `[""]`.
///
/// ```
/// use aicf_rpc::wire::split_fields;
///
/// assert_eq!(split_fields(r"a\|b|c\\|"), vec!["a|b", r"c\", ""]);
/// ```
pub fn split_fields(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Normal;
    for c in input.chars() {
        match state {
            ScanState::Normal => match c {
                ESCAPE => state = ScanState::Escaped,
                SEPARATOR => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
            ScanState::Escaped => {
                current.push(match c {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                state = ScanState::Normal;
            }
        }
    }
    if state == ScanState::Escaped {
        // dangling escape at end of input
        current.push(ESCAPE);
    }
    fields.push(current);
    fields
}

/// Escapes one field; the exact inverse of what [`split_fields`] undoes.
///
/// ```
/// use aicf_rpc::wire::escape_field;
///
/// assert_eq!(escape_field("a|b\nc"), r"a\|b\nc");
/// ```
pub fn escape_field(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            ESCAPE => escaped.push_str(r"\\"),
            SEPARATOR => escaped.push_str(r"\|"),
            '\n' => escaped.push_str(r"\n"),
            '\t' => escaped.push_str(r"\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(SEPARATOR);
        }
        line.push_str(&escape_field(field.as_ref()));
    }
    line
}

fn parse_number(text: &str) -> Option<Number> {
    if !text.contains('.') {
        if let Ok(integer) = text.parse::<i64>() {
            return Some(integer.into());
        }
        if let Ok(integer) = text.parse::<u64>() {
            return Some(integer.into());
        }
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Types one unescaped `CALL` argument. `None` is `undefined`.
///
/// ```
/// use aicf_rpc::wire::infer_value;
/// use serde_json::json;
///
/// assert_eq!(infer_value("123"), Some(json!(123)));
/// assert_eq!(infer_value(r#"{"a":1}"#), Some(json!({"a": 1})));
/// assert_eq!(infer_value("{oops"), Some(json!("{oops")));
/// assert_eq!(infer_value("undefined"), None);
/// ```
pub fn infer_value(field: &str) -> Option<Value> {
    let json_shaped = (field.starts_with('{') && field.ends_with('}'))
        || (field.starts_with('[') && field.ends_with(']'));
    if json_shaped {
        if let Ok(value) = serde_json::from_str::<Value>(field) {
            return Some(value);
        }
    }
    if NUMERIC.is_match(field) {
        if let Some(number) = parse_number(field) {
            return Some(Value::Number(number));
        }
    }
    match field {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "undefined" => None,
        _ => Some(Value::String(field.to_string())),
    }
}

fn tool_name(field: Option<String>, command: Command) -> Result<String, ParseError> {
    match field {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(ParseError::MissingToolName(command)),
    }
}

/// Decodes one request line.
///
/// A trailing CR/LF is ignored. Compact requests carry no id, so the decoded
/// request's id is `null`.
pub fn decode_request(line: &str) -> Result<Request, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut fields = split_fields(line).into_iter();
    let command = fields.next().unwrap_or_default();
    let operation = match Command::parse(&command) {
        Some(Command::List) => Operation::ListCapabilities,
        Some(Command::Info) => Operation::GetToolInfo {
            tool: tool_name(fields.next(), Command::Info)?,
        },
        Some(Command::Call) => {
            let tool = tool_name(fields.next(), Command::Call)?;
            let arguments = fields
                .map(|field| PositionalArgument {
                    value: infer_value(&field),
                    source: Some(field),
                })
                .collect();
            Operation::InvokeTool {
                tool,
                arguments: Arguments::Positional(arguments),
                timeout: None,
            }
        }
        None => return Err(ParseError::UnknownCommand(command)),
    };
    Ok(Request::new(Value::Null, operation))
}

fn argument_text(argument: &PositionalArgument) -> String {
    if let Some(source) = &argument.source {
        return source.clone();
    }
    match &argument.value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Encodes a request as a compact line.
///
/// Returns `None` for requests the compact grammar cannot express: handshakes,
/// context reads, and invocations with named arguments. Arguments decoded from
/// a line are written back from their source text, so `007` stays `007`.
///
/// ```
/// use aicf_rpc::wire::{decode_request, encode_request};
///
/// let line = r"CALL|notes.append|line one\nline two|true|007";
/// assert_eq!(encode_request(&decode_request(line).unwrap()).as_deref(), Some(line));
/// ```
pub fn encode_request(request: &Request) -> Option<String> {
    match &request.operation {
        Operation::ListCapabilities => Some(Command::List.as_str().to_string()),
        Operation::GetToolInfo { tool } => Some(join_fields([Command::Info.as_str(), tool])),
        Operation::InvokeTool {
            tool,
            arguments: Arguments::Positional(arguments),
            ..
        } => {
            let mut fields = vec![Command::Call.as_str().to_string(), tool.clone()];
            fields.extend(arguments.iter().map(argument_text));
            Some(join_fields(fields))
        }
        Operation::InvokeTool { .. } | Operation::Handshake { .. } | Operation::GetContext { .. } => {
            None
        }
    }
}

/// Renders a success payload as the field after `OK|`, already escaped.
fn payload_field(payload: &Value) -> String {
    match payload {
        Value::Null => String::new(),
        Value::String(s) => escape_field(s),
        Value::Bool(_) | Value::Number(_) => payload.to_string(),
        Value::Object(_) | Value::Array(_) => escape_field(&payload.to_string()),
    }
}

/// `OK|<payload>`.
///
/// ```
/// use aicf_rpc::wire::encode_success;
/// use serde_json::json;
///
/// assert_eq!(encode_success(&json!(null)), "OK|");
/// assert_eq!(encode_success(&json!("a|b")), r"OK|a\|b");
/// assert_eq!(encode_success(&json!({"n": 1})), r#"OK|{"n":1}"#);
/// ```
pub fn encode_success(payload: &Value) -> String {
    format!("OK{SEPARATOR}{}", payload_field(payload))
}

/// `ERR|<code>|<message>`.
pub fn encode_failure(error: &Error) -> String {
    format!(
        "ERR{SEPARATOR}{}{SEPARATOR}{}",
        error.compact_code(),
        escape_field(&error.to_string())
    )
}

/// `TOOLS|<name>|...`; an empty list still produces `TOOLS|`.
pub fn encode_tool_list<S: AsRef<str>>(names: &[S]) -> String {
    format!(
        "TOOLS{SEPARATOR}{}",
        join_fields(names.iter().map(AsRef::as_ref))
    )
}

/// `TOOL|<name>|<description>|<arg>:<type>|...`.
pub fn encode_tool_info(info: &ToolInfo) -> String {
    let mut fields = vec![
        "TOOL".to_string(),
        info.name.clone(),
        info.description.clone(),
    ];
    fields.extend(
        info.arguments
            .iter()
            .map(|a| format!("{}:{}", a.name, a.r#type)),
    );
    join_fields(fields)
}

/// Encodes a response in the compact format.
///
/// A capability list is written as `TOOLS|...` and carries tool names only;
/// contexts have no compact representation.
pub fn encode_response(response: &Response) -> String {
    match &response.outcome {
        Ok(Payload::Value(value)) => encode_success(value),
        Ok(Payload::Capabilities(capabilities)) => {
            let names: Vec<&str> = capabilities
                .iter()
                .filter(|c| matches!(c, Capability::Tool(_)))
                .map(Capability::name)
                .collect();
            encode_tool_list(&names)
        }
        Ok(Payload::ToolInfo(info)) => encode_tool_info(info),
        Ok(payload @ Payload::Handshake(_)) => match serde_json::to_value(payload) {
            Ok(value) => encode_success(&value),
            Err(e) => encode_failure(&Error::Internal(e.to_string())),
        },
        Err(error) => encode_failure(error),
    }
}
