use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use ovai_core::{AppState, GatewayError, UpstreamRequest, begin_stream, dispatch_raw};
use ovai_protocol::sse::frame_record;

use crate::respond::fail_error;

fn upstream_url(state: &AppState, endpoint: &str) -> Result<String, GatewayError> {
    let origin = state
        .ollama_origin
        .as_deref()
        .ok_or_else(|| GatewayError::internal("no proxy origin configured"))?;
    Ok(format!("{origin}/api/{endpoint}"))
}

/// Forwards the byte-exact body and copies the reply verbatim.
pub(crate) async fn request(
    state: &AppState,
    endpoint: &str,
    payload: Bytes,
    result: &str,
    model: &str,
) -> Response {
    let url = match upstream_url(state, endpoint) {
        Ok(url) => url,
        Err(err) => return fail_error(err),
    };
    match dispatch_raw(state.client.as_ref(), UpstreamRequest::post_raw(url, payload)).await {
        Ok((_, output)) => {
            if model.is_empty() {
                tracing::debug!(target: "ovai", "< {result} with {} bytes", output.len());
            } else {
                tracing::debug!(target: "ovai", "< {result} by {model} with {} bytes", output.len());
            }
            (
                [(header::CONTENT_TYPE, "application/json")],
                output,
            )
                .into_response()
        }
        Err(err) => fail_error(err),
    }
}

/// Forwards the byte-exact body and copies the streamed reply, optionally
/// re-framing each read as an SSE record for event-stream clients.
pub(crate) async fn stream(
    state: &AppState,
    endpoint: &str,
    payload: Bytes,
    as_event_stream: bool,
) -> Response {
    let url = match upstream_url(state, endpoint) {
        Ok(url) => url,
        Err(err) => return fail_error(err),
    };
    let mut rx = match begin_stream(
        state.client.as_ref(),
        UpstreamRequest::post_raw(url, payload),
    )
    .await
    {
        Ok(rx) => rx,
        Err(err) => return fail_error(err),
    };

    let (tx, out) = mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            let chunk = if as_event_stream {
                frame_record(&chunk)
            } else {
                chunk
            };
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });

    let content_type = if as_event_stream {
        "text/event-stream"
    } else {
        "application/json"
    };
    let body = Body::from_stream(ReceiverStream::new(out).map(Ok::<_, std::convert::Infallible>));
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}
