use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use ovai_core::AppState;
use ovai_protocol::gemini::{EmbeddingInstance, EmbeddingsRequest, EmbeddingsResponse};
use ovai_protocol::native::{EmbedOutput, EmbedRequest, EmbeddingsInput, EmbeddingsOutput};
use ovai_vertex::predict_suffix;

use crate::catalog::EMBEDDING_PREFIXES;
use crate::forward::forward_json;
use crate::proxy;
use crate::respond::{fail_error, wrong_input};

fn embedding_body(text: &str) -> EmbeddingsRequest {
    EmbeddingsRequest {
        instances: vec![EmbeddingInstance {
            content: text.to_string(),
        }],
    }
}

fn extract_embedding(response: &EmbeddingsResponse) -> (Vec<f64>, u32) {
    match response.predictions.first() {
        Some(prediction) => (
            prediction.embeddings.values.clone(),
            prediction.embeddings.statistics.token_count,
        ),
        None => (Vec::new(), 0),
    }
}

/// Legacy single-prompt endpoint: `{model, prompt}` to one vector.
pub(crate) async fn handle_embeddings(
    State(state): State<Arc<AppState>>,
    payload: Bytes,
) -> Response {
    let input: EmbeddingsInput = match serde_json::from_slice(&payload) {
        Ok(input) => input,
        Err(err) => return wrong_input(format!("decoding request body failed: {err}")),
    };
    if input.model.is_empty() {
        return wrong_input("model missing");
    }
    if input.prompt.is_empty() {
        return wrong_input("prompt missing");
    }
    tracing::debug!(
        target: "ovai",
        "> vectorise {} characters using {}",
        input.prompt.len(),
        input.model
    );

    let body = embedding_body(&input.prompt);
    let output: EmbeddingsResponse =
        match forward_json(&state, &predict_suffix(&input.model), &body).await {
            Ok((output, _)) => output,
            Err(err) => return fail_error(err),
        };
    let (values, tokens) = extract_embedding(&output);
    tracing::debug!(
        target: "ovai",
        "< embedding by {} with {} floats from {tokens} tokens",
        input.model,
        values.len()
    );
    Json(EmbeddingsOutput { embedding: values }).into_response()
}

/// Batch endpoint: `{model, input}` where input is a string or list; one
/// upstream predict call per element.
pub(crate) async fn handle_embed(State(state): State<Arc<AppState>>, payload: Bytes) -> Response {
    let input: EmbedRequest = match serde_json::from_slice(&payload) {
        Ok(input) => input,
        Err(err) => return wrong_input(format!("decoding request body failed: {err}")),
    };
    if input.model.is_empty() {
        return wrong_input("model missing");
    }
    let texts = input.input.into_vec();
    if texts.is_empty() {
        return wrong_input("input missing");
    }
    for (index, text) in texts.iter().enumerate() {
        if text.is_empty() {
            return wrong_input(format!("input {index} empty"));
        }
    }

    let translated = EMBEDDING_PREFIXES
        .iter()
        .any(|prefix| input.model.starts_with(prefix));
    if !translated {
        if state.can_proxy() {
            return proxy::request(&state, "embed", payload, "embeddings", &input.model).await;
        }
        return wrong_input(format!("unrecognised model {:?}", input.model));
    }
    tracing::debug!(
        target: "ovai",
        "> vectorise {} texts using {}",
        texts.len(),
        input.model
    );

    let mut embeddings = Vec::with_capacity(texts.len());
    for text in &texts {
        let body = embedding_body(text);
        let output: EmbeddingsResponse =
            match forward_json(&state, &predict_suffix(&input.model), &body).await {
                Ok((output, _)) => output,
                Err(err) => return fail_error(err),
            };
        let (values, tokens) = extract_embedding(&output);
        tracing::debug!(
            target: "ovai",
            "< embedding by {} with {} floats from {tokens} tokens",
            input.model,
            values.len()
        );
        embeddings.push(values);
    }
    Json(EmbedOutput { embeddings }).into_response()
}
