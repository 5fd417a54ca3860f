mod embedding;
mod request;
mod response;
mod types;

pub use embedding::{
    EmbeddingInstance, EmbeddingPrediction, EmbeddingStatistics, EmbeddingValues,
    EmbeddingsRequest, EmbeddingsResponse,
};
pub use request::GenerateContentRequest;
pub use response::{Candidate, GenerateContentResponse, StreamRecord, UsageMetadata};
pub use types::{
    Blob, Content, ContentRole, FunctionCall, FunctionDeclaration, FunctionResponse,
    GenerationConfig, Part, SafetySetting, ThinkingConfig, Tool,
};
