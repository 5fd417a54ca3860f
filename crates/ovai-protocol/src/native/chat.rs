use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::native::generate::{ModelOptions, ThinkFlag};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// Deserialized leniently; emitted with every value rendered as a string.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: ToolCallFunction,
}

/// Tool declaration as sent by clients: `{type:"function", function:{...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Base64-encoded image payloads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub tools: Vec<FunctionTool>,
    #[serde(default)]
    pub think: Option<ThinkFlag>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub options: ModelOptions,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatChunk {
    pub model: String,
    pub created_at: String,
    pub message: ChatMessage,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub model: String,
    pub created_at: String,
    pub message: ChatMessage,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    pub total_duration: i64,
    pub load_duration: i64,
    pub prompt_eval_count: u32,
    pub prompt_eval_duration: i64,
    pub eval_count: u32,
    pub eval_duration: i64,
}
