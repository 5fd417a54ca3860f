use serde::{Deserialize, Deserializer, Serialize};

use crate::native::{FunctionTool, ToolCall};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUrl {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_url: ImageUrl,
}

/// Message content arrives either as a bare string or as a list of typed
/// parts; a bare string becomes a single text part.
#[derive(Debug, Clone, Default)]
pub struct ContentParts(pub Vec<ContentPart>);

impl<'de> Deserialize<'de> for ContentParts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Parts(Vec<ContentPart>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => ContentParts(vec![ContentPart {
                kind: "text".to_string(),
                text,
                image_url: ImageUrl::default(),
            }]),
            Repr::Parts(parts) => ContentParts(parts),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionsMessage {
    pub role: String,
    #[serde(default)]
    pub content: ContentParts,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionsRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<CompletionsMessage>,
    #[serde(default)]
    pub tools: Vec<FunctionTool>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub stream_options: StreamOptions,
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,
    #[serde(default)]
    pub max_completion_tokens: Option<i32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub thinking_budget: Option<i32>,
}

fn default_reasoning_effort() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionsEnvelope {
    pub model: String,
    pub created: i64,
    pub id: String,
    pub object: &'static str,
    pub system_fingerprint: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputMessage {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaChoice {
    pub index: u32,
    pub delta: OutputMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteChoice {
    pub index: u32,
    pub message: OutputMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompletionsUsage {
    pub completion_tokens: u32,
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionsChunk {
    #[serde(flatten)]
    pub envelope: CompletionsEnvelope,
    pub choices: Vec<DeltaChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionsResponse {
    #[serde(flatten)]
    pub envelope: CompletionsEnvelope,
    pub choices: Vec<CompleteChoice>,
    pub usage: CompletionsUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_accepts_string_and_parts() {
        let message: CompletionsMessage =
            serde_json::from_str(r#"{"role":"user","content":"hello"}"#).unwrap();
        assert_eq!(message.content.0.len(), 1);
        assert_eq!(message.content.0[0].kind, "text");
        assert_eq!(message.content.0[0].text, "hello");

        let raw = r#"{"role":"user","content":[{"type":"text","text":"look"},{"type":"image_url","image_url":{"url":"data:image/png;base64,aGk="}}]}"#;
        let message: CompletionsMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.content.0.len(), 2);
        assert_eq!(message.content.0[1].kind, "image_url");
    }

    #[test]
    fn delta_choice_serializes_null_finish_reason() {
        let choice = DeltaChoice {
            index: 0,
            delta: OutputMessage {
                role: "assistant",
                content: "hi".into(),
                tool_calls: Vec::new(),
            },
            finish_reason: None,
        };
        let encoded = serde_json::to_string(&choice).unwrap();
        assert!(encoded.ends_with(r#""finish_reason":null}"#));
    }
}
