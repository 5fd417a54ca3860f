use serde_json::{Map, Value};

use ovai_protocol::gemini::{FunctionCall, GenerateContentResponse};
use ovai_protocol::native::{ToolCall, ToolCallFunction};

/// What candidate[0] of a provider reply carried: thought bytes, answer
/// bytes, function calls, the terminal code and token accounting.
#[derive(Debug, Clone, Default)]
pub struct ExtractedCandidate {
    pub thinking: String,
    pub content: String,
    pub function_calls: Vec<FunctionCall>,
    pub finish_reason: Option<String>,
    pub prompt_tokens: u32,
    pub content_tokens: u32,
}

pub fn extract_candidate(response: &GenerateContentResponse) -> ExtractedCandidate {
    let mut extracted = ExtractedCandidate::default();
    if let Some(candidate) = response.candidates.first() {
        extracted.finish_reason = candidate
            .finish_reason
            .clone()
            .filter(|reason| !reason.is_empty());
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                if let Some(call) = &part.function_call {
                    extracted.function_calls.push(call.clone());
                } else if let Some(text) = &part.text {
                    if part.thought == Some(true) {
                        extracted.thinking.push_str(text);
                    } else {
                        extracted.content.push_str(text);
                    }
                }
            }
        }
    }
    if let Some(usage) = &response.usage_metadata {
        extracted.prompt_tokens = usage.prompt_token_count;
        extracted.content_tokens = usage.candidates_token_count;
    }
    extracted
}

/// The upstream terminal code, lowercased for the native `done_reason`.
pub fn done_reason(finish_reason: &str) -> String {
    finish_reason.to_lowercase()
}

/// Provider function calls become native tool calls with every argument
/// rendered as a string.
pub fn to_tool_calls(calls: &[FunctionCall]) -> Vec<ToolCall> {
    calls
        .iter()
        .map(|call| {
            let mut arguments = Map::new();
            if let Some(Value::Object(args)) = &call.args {
                for (name, value) in args {
                    let rendered = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    arguments.insert(name.clone(), Value::String(rendered));
                }
            }
            ToolCall {
                function: ToolCallFunction {
                    name: call.name.clone(),
                    arguments,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_thoughts_from_answer_text() {
        let raw = r#"{
            "candidates":[{"content":{"role":"model","parts":[
                {"text":"pondering...","thought":true},
                {"text":"hello "},
                {"text":"world"}
            ]},"finishReason":"STOP"}],
            "usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":7}
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let extracted = extract_candidate(&response);
        assert_eq!(extracted.thinking, "pondering...");
        assert_eq!(extracted.content, "hello world");
        assert_eq!(extracted.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(extracted.prompt_tokens, 3);
        assert_eq!(extracted.content_tokens, 7);
    }

    #[test]
    fn collects_function_calls() {
        let raw = r#"{
            "candidates":[{"content":{"role":"model","parts":[
                {"functionCall":{"name":"get_time","args":{"zone":"UTC","retries":2}}}
            ]}}]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let extracted = extract_candidate(&response);
        assert_eq!(extracted.function_calls.len(), 1);

        let calls = to_tool_calls(&extracted.function_calls);
        assert_eq!(calls[0].function.name, "get_time");
        assert_eq!(calls[0].function.arguments["zone"], "UTC");
        // Non-string argument values are rendered as strings.
        assert_eq!(calls[0].function.arguments["retries"], "2");
    }

    #[test]
    fn empty_reply_extracts_to_defaults() {
        let response = GenerateContentResponse::default();
        let extracted = extract_candidate(&response);
        assert!(extracted.content.is_empty());
        assert!(extracted.finish_reason.is_none());
        assert_eq!(extracted.prompt_tokens, 0);
    }

    #[test]
    fn done_reason_is_lowercased() {
        assert_eq!(done_reason("STOP"), "stop");
        assert_eq!(done_reason("MAX_TOKENS"), "max_tokens");
    }
}
