use serde::{Deserialize, Serialize};

/// `think` accepts both an on/off switch and a named effort level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ThinkFlag {
    Enabled(bool),
    Level(String),
}

/// Sampling options in the assistant-server vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelOptions {
    #[serde(default)]
    pub num_predict: Option<i32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub top_k: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    /// Base64-encoded image payloads.
    #[serde(default)]
    pub images: Vec<String>,
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
pub struct GenerateChunk {
    pub model: String,
    pub created_at: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub model: String,
    pub created_at: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
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
