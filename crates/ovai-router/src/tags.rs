use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use ovai_core::{AppState, GatewayError, UpstreamRequest, dispatch_raw};
use ovai_protocol::native::{ModelInfo, ModelsOutput, OpenAiModel, TagsOutput};

use crate::catalog::google_models;
use crate::respond::fail_error;

/// The static catalog, extended with the fallback server's models when a
/// proxy origin is configured.
async fn all_models(state: &AppState) -> Result<Vec<ModelInfo>, GatewayError> {
    let mut models = google_models();
    if let Some(origin) = &state.ollama_origin {
        let request = UpstreamRequest::get(format!("{origin}/api/tags"));
        let (_, body) = dispatch_raw(state.client.as_ref(), request).await?;
        let proxied: TagsOutput = serde_json::from_slice(&body).map_err(|err| {
            tracing::debug!(target: "ovai", "decoding response body failed: {err}");
            GatewayError::internal("decoding response body failed")
        })?;
        models.extend(proxied.models);
    }
    Ok(models)
}

pub(crate) async fn handle_tags(State(state): State<Arc<AppState>>) -> Response {
    match all_models(&state).await {
        Ok(models) => {
            tracing::debug!(target: "ovai", "< {} models", models.len());
            Json(TagsOutput { models }).into_response()
        }
        Err(err) => fail_error(err),
    }
}

pub(crate) async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    match all_models(&state).await {
        Ok(models) => {
            let data = models
                .into_iter()
                .map(|model| OpenAiModel {
                    id: model.name,
                    object: "model",
                    created: 0,
                    owned_by: "ovai",
                })
                .collect();
            Json(ModelsOutput {
                object: "list",
                data,
            })
            .into_response()
        }
        Err(err) => fail_error(err),
    }
}
