use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use ovai_core::AppState;

/// Initiates the same graceful shutdown as a termination signal.
pub(crate) async fn handle(State(state): State<Arc<AppState>>) -> Response {
    tracing::debug!(target: "ovai", ": shut down");
    let _ = state.shutdown.try_send(());
    StatusCode::NO_CONTENT.into_response()
}
