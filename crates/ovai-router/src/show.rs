use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use ovai_core::AppState;
use ovai_protocol::native::{ShowOutput, ShowRequest};

use crate::catalog::{GOOGLE_PREFIXES, find_model};
use crate::proxy;
use crate::respond::wrong_input;

pub(crate) async fn handle(State(state): State<Arc<AppState>>, payload: Bytes) -> Response {
    let input: ShowRequest = match serde_json::from_slice(&payload) {
        Ok(input) => input,
        Err(err) => return wrong_input(format!("decoding request body failed: {err}")),
    };
    if input.name.is_empty() {
        return wrong_input("model name missing");
    }
    tracing::debug!(target: "ovai", "> look for {}", input.name);

    if GOOGLE_PREFIXES
        .iter()
        .any(|prefix| input.name.starts_with(prefix))
    {
        if let Some(model) = find_model(&input.name) {
            tracing::debug!(target: "ovai", "< found {}", input.name);
            return Json(ShowOutput {
                details: model.details,
                ..ShowOutput::default()
            })
            .into_response();
        }
    } else if state.can_proxy() {
        return proxy::request(&state, "show", payload, "model", "").await;
    }
    wrong_input(format!("unrecognised model {:?}", input.name))
}
