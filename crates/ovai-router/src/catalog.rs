use ovai_protocol::native::{ModelDetails, ModelInfo};

/// Model-name prefixes served by the Vertex backend for show lookups.
pub(crate) const GOOGLE_PREFIXES: [&str; 5] = [
    "gemini",
    "text-embedding",
    "textembedding-gecko",
    "text-multilingual-embedding",
    "multimodalembedding",
];

/// Model-name prefixes accepted by the embedding endpoints.
pub(crate) const EMBEDDING_PREFIXES: [&str; 5] = [
    "textembedding-gecko",
    "textembedding-gecko-multilingual",
    "text-embedding",
    "multimodalembedding",
    "text-multilingual-embedding",
];

fn model(name: &str, family: &str, modified_at: &str) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        model: name.to_string(),
        modified_at: modified_at.to_string(),
        details: ModelDetails {
            family: family.to_string(),
            families: vec![family.to_string()],
            ..ModelDetails::default()
        },
        ..ModelInfo::default()
    }
}

/// The static catalog advertised by the listing endpoints.
pub(crate) fn google_models() -> Vec<ModelInfo> {
    vec![
        model("gemini-2.5-pro", "gemini-2.5-pro", "2025-06-17T00:00:00.000Z"),
        model(
            "gemini-2.5-flash",
            "gemini-2.5-flash",
            "2025-06-17T00:00:00.000Z",
        ),
        model(
            "gemini-2.5-flash-lite",
            "gemini-2.5-flash-lite",
            "2025-07-22T00:00:00.000Z",
        ),
        model(
            "gemini-2.0-flash-001",
            "gemini-2.0-flash",
            "2025-02-05T00:00:00.000Z",
        ),
        model(
            "text-embedding-005",
            "text-embedding",
            "2024-11-18T00:00:00.000Z",
        ),
        model(
            "text-multilingual-embedding-002",
            "text-multilingual-embedding",
            "2024-05-14T00:00:00.000Z",
        ),
        model(
            "multimodalembedding@001",
            "multimodalembedding",
            "2024-02-12T00:00:00.000Z",
        ),
    ]
}

pub(crate) fn find_model(name: &str) -> Option<ModelInfo> {
    google_models().into_iter().find(|model| model.name == name)
}
