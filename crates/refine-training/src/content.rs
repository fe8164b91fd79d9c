//! Stored inference input/output as written by the gateway.
//!
//! Content blocks are decoded by their `type` tag. Kinds this tool cannot turn
//! into training data decode to `Unsupported` (keeping the tag for the drop
//! reason) instead of failing, so one odd record never aborts a run.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    /// Unparsed arguments; used when `arguments` is null.
    #[serde(default)]
    pub raw_arguments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub result: String,
}

/// A content block inside a stored input message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputBlock {
    /// A literal string, or template arguments for the message's role.
    Text { value: Value },
    RawText { value: String },
    Thought { text: String },
    ToolCall(ToolCallBlock),
    ToolResult(ToolResultBlock),
    Unsupported { kind: String },
}

/// A content block of a stored chat output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputBlock {
    Text { text: String },
    Thought { text: String },
    ToolCall(ToolCallBlock),
    Unsupported { kind: String },
}

impl InputBlock {
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::RawText { .. } => "raw_text",
            Self::Thought { .. } => "thought",
            Self::ToolCall(_) => "tool_call",
            Self::ToolResult(_) => "tool_result",
            Self::Unsupported { kind } => kind,
        }
    }
}

impl OutputBlock {
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Thought { .. } => "thought",
            Self::ToolCall(_) => "tool_call",
            Self::Unsupported { kind } => kind,
        }
    }
}

#[derive(Deserialize)]
struct TextPayload {
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ValuePayload {
    value: String,
}

#[derive(Deserialize)]
struct TextField {
    text: String,
}

fn block_kind<E: de::Error>(value: &Value) -> Result<String, E> {
    value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| E::custom("content block is missing a string `type` tag"))
}

fn payload<T: DeserializeOwned, E: de::Error>(value: Value, kind: &str) -> Result<T, E> {
    serde_json::from_value(value).map_err(|e| E::custom(format!("malformed `{kind}` block: {e}")))
}

impl<'de> Deserialize<'de> for InputBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = block_kind::<D::Error>(&value)?;

        Ok(match kind.as_str() {
            "text" => {
                let p: TextPayload = payload::<_, D::Error>(value, &kind)?;
                let value = p
                    .value
                    .or_else(|| p.text.map(Value::String))
                    .ok_or_else(|| <D::Error as de::Error>::custom("malformed `text` block: missing `value`"))?;
                Self::Text { value }
            }
            "raw_text" => Self::RawText { value: payload::<ValuePayload, D::Error>(value, &kind)?.value },
            "thought" => Self::Thought { text: payload::<TextField, D::Error>(value, &kind)?.text },
            "tool_call" => Self::ToolCall(payload::<_, D::Error>(value, &kind)?),
            "tool_result" => Self::ToolResult(payload::<_, D::Error>(value, &kind)?),
            _ => Self::Unsupported { kind },
        })
    }
}

impl<'de> Deserialize<'de> for OutputBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = block_kind::<D::Error>(&value)?;

        Ok(match kind.as_str() {
            "text" => Self::Text { text: payload::<TextField, D::Error>(value, &kind)?.text },
            "thought" => Self::Thought { text: payload::<TextField, D::Error>(value, &kind)?.text },
            "tool_call" => Self::ToolCall(payload::<_, D::Error>(value, &kind)?),
            _ => Self::Unsupported { kind },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredMessage {
    pub role: InputRole,
    pub content: Vec<InputBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct StoredInput {
    /// System arguments: a literal string or an object for the system template.
    #[serde(default)]
    pub system: Option<Value>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// Output of a `json` function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonOutput {
    pub raw: String,
    #[serde(default)]
    pub parsed: Option<Value>,
}
