use ovai_core::GatewayError;

/// Input problems found while building the provider request; all surface
/// as HTTP 400 with the message below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("invalid chat message role: {0:?}")]
    InvalidRole(String),
    #[error("no user message found")]
    NoUserMessage,
    #[error("invalid data URI prefix: {0}")]
    InvalidDataUriPrefix(String),
    #[error("missing semicolon in data URI: {0}")]
    MissingSemicolon(String),
    #[error("missing comma in data URI: {0}")]
    MissingComma(String),
    #[error("invalid image type: {0}")]
    InvalidImageType(String),
    #[error("invalid image encoding: {0}")]
    InvalidImageEncoding(String),
    #[error("decoding image failed: {0}")]
    InvalidImageData(String),
    #[error("invalid content type: {0:?}")]
    InvalidContentType(String),
    #[error("invalid content type of tool result: {0}")]
    InvalidToolContentType(String),
    #[error("invalid think level: {0:?}")]
    InvalidThinkLevel(String),
    #[error("unrecognised thinking model: {0:?}")]
    UnknownThinkingModel(String),
}

impl From<TranslateError> for GatewayError {
    fn from(err: TranslateError) -> Self {
        GatewayError::bad_request(err.to_string())
    }
}
