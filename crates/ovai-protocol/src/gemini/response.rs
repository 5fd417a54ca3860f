use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gemini::types::Content;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    /// Absent on partial stream records; the upstream code is forwarded
    /// lowercased, so it stays an uninterpreted string here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_ratings: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

/// The streaming format reuses this envelope with different populated
/// fields; the final record carries a finish reason and usage metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
            .filter(|reason| !reason.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    Partial(GenerateContentResponse),
    Final(GenerateContentResponse),
}

impl StreamRecord {
    /// Decodes one framed record and classifies it by the populated fields.
    pub fn decode(data: &str) -> Result<Self, serde_json::Error> {
        let response: GenerateContentResponse = serde_json::from_str(data)?;
        if response.finish_reason().is_some() {
            Ok(StreamRecord::Final(response))
        } else {
            Ok(StreamRecord::Partial(response))
        }
    }
}
