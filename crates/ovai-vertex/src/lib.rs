mod error;
mod messages;
mod request;
mod response;
mod thinking;

pub use error::TranslateError;
pub use messages::{
    convert_chat_messages, convert_completions_messages, convert_generate_prompt,
};
pub use request::{
    chat_body, completions_body, convert_tools, generate_body, generate_suffix, model_url,
    predict_suffix, stream_suffix,
};
pub use response::{ExtractedCandidate, done_reason, extract_candidate, to_tool_calls};
pub use thinking::{ThinkLevel, thinking_budget, thinking_config};
