use serde::{Deserialize, Serialize};

/// A bare string or a list of strings; clients send either.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(text) => vec![text],
            OneOrMany::Many(texts) => texts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub input: OneOrMany,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedOutput {
    pub embeddings: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsInput {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsOutput {
    pub embedding: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_accepts_scalar_and_array() {
        let input: EmbedRequest =
            serde_json::from_str(r#"{"model":"text-embedding-005","input":"hello"}"#).unwrap();
        assert_eq!(input.input.into_vec(), vec!["hello"]);

        let input: EmbedRequest =
            serde_json::from_str(r#"{"model":"text-embedding-005","input":["a","b"]}"#).unwrap();
        assert_eq!(input.input.into_vec(), vec!["a", "b"]);
    }
}
