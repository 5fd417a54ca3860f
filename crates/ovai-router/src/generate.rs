use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use ovai_core::AppState;
use ovai_protocol::gemini::{GenerateContentRequest, GenerateContentResponse, StreamRecord};
use ovai_protocol::native::{GenerateChunk, GenerateRequest, GenerateResponse};
use ovai_vertex::{
    done_reason, extract_candidate, generate_body, generate_suffix, stream_suffix,
};

use crate::forward::{RecordStream, forward_json, forward_stream};
use crate::proxy;
use crate::respond::{
    accepts_event_stream, created_at, fail_error, json_line, non_empty, split_duration,
    wrong_input,
};

pub(crate) async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Bytes,
) -> Response {
    let input: GenerateRequest = match serde_json::from_slice(&payload) {
        Ok(input) => input,
        Err(err) => return wrong_input(format!("decoding request body failed: {err}")),
    };
    if input.model.is_empty() {
        return wrong_input("model missing");
    }
    if input.prompt.is_empty() {
        return wrong_input("prompt missing");
    }

    if !input.model.starts_with("gemini") {
        if state.can_proxy() {
            return if input.stream {
                proxy::stream(&state, "generate", payload, accepts_event_stream(&headers)).await
            } else {
                proxy::request(&state, "generate", payload, "response", &input.model).await
            };
        }
        return wrong_input(format!("unrecognised model {:?}", input.model));
    }
    tracing::debug!(
        target: "ovai",
        "> generate from {} characters using {}",
        input.prompt.len(),
        input.model
    );

    let body = match generate_body(&input, &state.defaults) {
        Ok(body) => body,
        Err(err) => return wrong_input(err.to_string()),
    };
    if input.stream {
        stream_translated(state, input.model, body).await
    } else {
        buffered(state, input.model, body).await
    }
}

async fn buffered(
    state: Arc<AppState>,
    model: String,
    body: GenerateContentRequest,
) -> Response {
    let (output, duration): (GenerateContentResponse, _) =
        match forward_json(&state, &generate_suffix(&model), &body).await {
            Ok(result) => result,
            Err(err) => return fail_error(err),
        };
    let extracted = extract_candidate(&output);
    tracing::debug!(
        target: "ovai",
        "< result by {model} with {} characters and {} tokens",
        extracted.content.len(),
        extracted.prompt_tokens + extracted.content_tokens
    );
    let durations = split_duration(duration);
    Json(GenerateResponse {
        model,
        created_at: created_at(),
        response: extracted.content,
        thinking: non_empty(extracted.thinking),
        done: true,
        done_reason: extracted.finish_reason.as_deref().map(done_reason),
        total_duration: durations.total,
        load_duration: 0,
        prompt_eval_count: extracted.prompt_tokens,
        prompt_eval_duration: durations.prompt_eval,
        eval_count: extracted.content_tokens,
        eval_duration: durations.eval,
    })
    .into_response()
}

async fn stream_translated(
    state: Arc<AppState>,
    model: String,
    body: GenerateContentRequest,
) -> Response {
    let start = Instant::now();
    let rx = match forward_stream(&state, &stream_suffix(&model), &body).await {
        Ok(rx) => rx,
        Err(err) => return fail_error(err),
    };

    let (tx, out) = mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut records = RecordStream::new(rx);
        let mut finished = false;
        // Thoughts are re-emitted per record; the terminal object carries
        // them in full for clients that only read the last chunk.
        let mut thoughts = String::new();
        while let Some(record) = records.next_record().await {
            match StreamRecord::decode(&record) {
                Ok(StreamRecord::Partial(response)) => {
                    let extracted = extract_candidate(&response);
                    thoughts.push_str(&extracted.thinking);
                    let chunk = GenerateChunk {
                        model: model.clone(),
                        created_at: created_at(),
                        response: extracted.content,
                        thinking: non_empty(extracted.thinking),
                        done: false,
                    };
                    let Some(line) = json_line(&chunk) else { break };
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
                Ok(StreamRecord::Final(response)) => {
                    let extracted = extract_candidate(&response);
                    thoughts.push_str(&extracted.thinking);
                    let durations = split_duration(start.elapsed());
                    let last = GenerateResponse {
                        model: model.clone(),
                        created_at: created_at(),
                        response: extracted.content,
                        thinking: non_empty(thoughts.clone()),
                        done: true,
                        done_reason: extracted.finish_reason.as_deref().map(done_reason),
                        total_duration: durations.total,
                        load_duration: 0,
                        prompt_eval_count: extracted.prompt_tokens,
                        prompt_eval_duration: durations.prompt_eval,
                        eval_count: extracted.content_tokens,
                        eval_duration: durations.eval,
                    };
                    if let Some(line) = json_line(&last) {
                        let _ = tx.send(line).await;
                    }
                    finished = true;
                    break;
                }
                Err(err) => {
                    tracing::debug!(target: "ovai", "decoding response body failed: {err}");
                    break;
                }
            }
        }
        if !finished && records.ended_empty() {
            tracing::debug!(target: "ovai", "response body stream ended unexpectedly");
        }
    });

    let stream = ReceiverStream::new(out).map(Ok::<_, Infallible>);
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream),
    )
        .into_response()
}
