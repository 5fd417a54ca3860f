use std::collections::VecDeque;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use ovai_core::{AppState, GatewayError, UpstreamRequest, begin_stream, dispatch};
use ovai_protocol::sse::SseFramer;
use ovai_vertex::model_url;

/// Dispatches a provider request under the cached bearer. A 401 forces one
/// token refresh and a single retry with the fresh bearer.
pub(crate) async fn forward_json<T: DeserializeOwned>(
    state: &AppState,
    suffix: &str,
    body: &impl Serialize,
) -> Result<(T, Duration), GatewayError> {
    let url = model_url(&state.defaults, state.project_id(), suffix);
    let token = state.tokens.use_access_token().await?;
    let start = Instant::now();
    let request = UpstreamRequest::post_json(&url, body)?.bearer(&token);
    match dispatch(state.client.as_ref(), request).await {
        Err(err) if err.status == StatusCode::UNAUTHORIZED => {
            let token = state.tokens.refresh().await?;
            let request = UpstreamRequest::post_json(&url, body)?.bearer(&token);
            let output = dispatch(state.client.as_ref(), request).await?;
            Ok((output, start.elapsed()))
        }
        Err(err) => Err(err),
        Ok(output) => Ok((output, start.elapsed())),
    }
}

/// Opens the provider's event stream; the caller owns the receiver. The
/// same 401 refresh-retry discipline applies to the handshake.
pub(crate) async fn forward_stream(
    state: &AppState,
    suffix: &str,
    body: &impl Serialize,
) -> Result<mpsc::Receiver<Bytes>, GatewayError> {
    let url = model_url(&state.defaults, state.project_id(), suffix);
    let token = state.tokens.use_access_token().await?;
    let request = UpstreamRequest::post_json(&url, body)?.bearer(&token);
    match begin_stream(state.client.as_ref(), request).await {
        Err(err) if err.status == StatusCode::UNAUTHORIZED => {
            let token = state.tokens.refresh().await?;
            let request = UpstreamRequest::post_json(&url, body)?.bearer(&token);
            begin_stream(state.client.as_ref(), request).await
        }
        other => other,
    }
}

/// Pulls complete framed records off the upstream body, reassembling
/// across read boundaries and draining the tail at end of stream.
pub(crate) struct RecordStream {
    rx: mpsc::Receiver<Bytes>,
    framer: SseFramer,
    pending: VecDeque<String>,
    saw_bytes: bool,
    ended: bool,
}

impl RecordStream {
    pub(crate) fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            framer: SseFramer::new(),
            pending: VecDeque::new(),
            saw_bytes: false,
            ended: false,
        }
    }

    pub(crate) async fn next_record(&mut self) -> Option<String> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(record);
            }
            if self.ended {
                return None;
            }
            match self.rx.recv().await {
                Some(chunk) => {
                    self.saw_bytes = true;
                    self.pending.extend(self.framer.push_bytes(&chunk));
                }
                None => {
                    self.ended = true;
                    self.pending.extend(self.framer.finish());
                }
            }
        }
    }

    /// True when the upstream closed without delivering a single byte.
    pub(crate) fn ended_empty(&self) -> bool {
        self.ended && !self.saw_bytes
    }
}
