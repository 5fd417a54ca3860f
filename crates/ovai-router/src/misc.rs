use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

pub(crate) async fn ping() -> Response {
    tracing::debug!(target: "ovai", ": ping");
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn root() -> Response {
    tracing::debug!(target: "ovai", ": root");
    (
        [(header::CONTENT_TYPE, "text/plain")],
        "Ollama is running",
    )
        .into_response()
}
