use std::convert::Infallible;
use std::sync::Arc;

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
use ovai_protocol::openai::{
    CompleteChoice, CompletionsChunk, CompletionsEnvelope, CompletionsRequest,
    CompletionsResponse, CompletionsUsage, DeltaChoice, OutputMessage,
};
use ovai_protocol::sse::frame_record;
use ovai_vertex::{
    ExtractedCandidate, completions_body, done_reason, extract_candidate, generate_suffix,
    stream_suffix, to_tool_calls,
};

use crate::forward::{RecordStream, forward_json, forward_stream};
use crate::proxy;
use crate::respond::{accepts_event_stream, created_at, fail_error, unix_now, wrong_input};

fn envelope(model: &str, chunked: bool) -> CompletionsEnvelope {
    CompletionsEnvelope {
        model: model.to_string(),
        created: unix_now(),
        id: created_at(),
        object: if chunked {
            "chat.completion.chunk"
        } else {
            "chat.completion"
        },
        system_fingerprint: "fp_gemini",
    }
}

fn output_message(extracted: &ExtractedCandidate) -> OutputMessage {
    OutputMessage {
        role: "assistant",
        content: extracted.content.clone(),
        tool_calls: to_tool_calls(&extracted.function_calls),
    }
}

fn sse_json<T: serde::Serialize>(value: &T) -> Option<Bytes> {
    serde_json::to_vec(value).ok().map(|payload| frame_record(&payload))
}

pub(crate) async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Bytes,
) -> Response {
    let input: CompletionsRequest = match serde_json::from_slice(&payload) {
        Ok(input) => input,
        Err(err) => return wrong_input(format!("decoding request body failed: {err}")),
    };
    if input.model.is_empty() {
        return wrong_input("model missing");
    }
    if input.messages.is_empty() {
        return wrong_input("messages missing");
    }

    if !input.model.starts_with("gemini") {
        if state.can_proxy() {
            return if input.stream {
                proxy::stream(
                    &state,
                    "chat/completions",
                    payload,
                    accepts_event_stream(&headers),
                )
                .await
            } else {
                proxy::request(&state, "chat/completions", payload, "answer", &input.model).await
            };
        }
        return wrong_input(format!("unrecognised model {:?}", input.model));
    }
    tracing::debug!(
        target: "ovai",
        "> ask with {} messages using {}",
        input.messages.len(),
        input.model
    );

    let body = match completions_body(&input, &state.defaults) {
        Ok(body) => body,
        Err(err) => return wrong_input(err.to_string()),
    };
    if input.stream {
        stream_translated(state, input, body).await
    } else {
        buffered(state, input, body).await
    }
}

async fn buffered(
    state: Arc<AppState>,
    input: CompletionsRequest,
    body: GenerateContentRequest,
) -> Response {
    let (output, _): (GenerateContentResponse, _) =
        match forward_json(&state, &generate_suffix(&input.model), &body).await {
            Ok(result) => result,
            Err(err) => return fail_error(err),
        };
    let extracted = extract_candidate(&output);
    tracing::debug!(
        target: "ovai",
        "< answer by {} with {} characters and {} tokens",
        input.model,
        extracted.content.len(),
        extracted.prompt_tokens + extracted.content_tokens
    );
    Json(CompletionsResponse {
        envelope: envelope(&input.model, false),
        choices: vec![CompleteChoice {
            index: 0,
            message: output_message(&extracted),
            finish_reason: Some(done_reason(
                extracted.finish_reason.as_deref().unwrap_or_default(),
            )),
        }],
        usage: CompletionsUsage {
            completion_tokens: extracted.content_tokens,
            prompt_tokens: extracted.prompt_tokens,
            total_tokens: extracted.prompt_tokens + extracted.content_tokens,
        },
    })
    .into_response()
}

async fn stream_translated(
    state: Arc<AppState>,
    input: CompletionsRequest,
    body: GenerateContentRequest,
) -> Response {
    let rx = match forward_stream(&state, &stream_suffix(&input.model), &body).await {
        Ok(rx) => rx,
        Err(err) => return fail_error(err),
    };

    let model = input.model.clone();
    let include_usage = input.stream_options.include_usage;
    let (tx, out) = mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut records = RecordStream::new(rx);
        let mut finished = false;
        while let Some(record) = records.next_record().await {
            let (response, is_final) = match StreamRecord::decode(&record) {
                Ok(StreamRecord::Partial(response)) => (response, false),
                Ok(StreamRecord::Final(response)) => (response, true),
                Err(err) => {
                    tracing::debug!(target: "ovai", "decoding response body failed: {err}");
                    break;
                }
            };
            let extracted = extract_candidate(&response);
            let chunk = CompletionsChunk {
                envelope: envelope(&model, true),
                choices: vec![DeltaChoice {
                    index: 0,
                    delta: output_message(&extracted),
                    finish_reason: extracted
                        .finish_reason
                        .as_deref()
                        .filter(|_| is_final)
                        .map(done_reason),
                }],
            };
            let Some(frame) = sse_json(&chunk) else { break };
            if tx.send(frame).await.is_err() {
                return;
            }
            if is_final {
                if include_usage {
                    let usage = CompletionsResponse {
                        envelope: envelope(&model, true),
                        choices: Vec::new(),
                        usage: CompletionsUsage {
                            completion_tokens: extracted.content_tokens,
                            prompt_tokens: extracted.prompt_tokens,
                            total_tokens: extracted.prompt_tokens + extracted.content_tokens,
                        },
                    };
                    if let Some(frame) = sse_json(&usage) {
                        if tx.send(frame).await.is_err() {
                            return;
                        }
                    }
                }
                let _ = tx.send(frame_record(b"[DONE]")).await;
                finished = true;
                break;
            }
        }
        if !finished && records.ended_empty() {
            tracing::debug!(target: "ovai", "response body stream ended unexpectedly");
        }
    });

    let stream = ReceiverStream::new(out).map(Ok::<_, Infallible>);
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(stream),
    )
        .into_response()
}
