mod chat;
mod embed;
mod generate;
mod model;

pub use chat::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, FunctionSpec, FunctionTool, ToolCall,
    ToolCallFunction,
};
pub use embed::{
    EmbedOutput, EmbedRequest, EmbeddingsInput, EmbeddingsOutput, OneOrMany,
};
pub use generate::{GenerateChunk, GenerateRequest, GenerateResponse, ModelOptions, ThinkFlag};
pub use model::{
    ModelDetails, ModelInfo, ModelsOutput, OpenAiModel, ShowOutput, ShowRequest, TagsOutput,
};
