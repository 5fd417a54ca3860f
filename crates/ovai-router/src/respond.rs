use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use ovai_core::GatewayError;

#[derive(Serialize)]
struct FailResponse {
    error: String,
}

pub(crate) fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(FailResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub(crate) fn wrong_input(message: impl Into<String>) -> Response {
    let message = message.into();
    tracing::debug!(target: "ovai", "! {message}");
    fail(StatusCode::BAD_REQUEST, message)
}

pub(crate) fn fail_error(err: GatewayError) -> Response {
    fail(err.status, err.message)
}

/// Second-precision RFC3339 timestamp for `created_at` fields.
pub(crate) fn created_at() -> String {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub(crate) fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// One streamed JSON object, newline-terminated.
pub(crate) fn json_line<T: Serialize>(value: &T) -> Option<bytes::Bytes> {
    let mut payload = serde_json::to_vec(value).ok()?;
    payload.push(b'\n');
    Some(bytes::Bytes::from(payload))
}

pub(crate) fn accepts_event_stream(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(axum::http::header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Durations {
    pub total: i64,
    pub prompt_eval: i64,
    pub eval: i64,
}

/// Nanosecond duration breakdown: a quarter is attributed to prompt
/// evaluation, the rest to generation.
pub(crate) fn split_duration(total: std::time::Duration) -> Durations {
    let total = total.as_nanos() as i64;
    let prompt_eval = total / 4;
    Durations {
        total,
        prompt_eval,
        eval: total - prompt_eval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_split_adds_up() {
        for nanos in [0u64, 1, 3, 4, 1_000_000_007] {
            let split = split_duration(Duration::from_nanos(nanos));
            assert_eq!(split.prompt_eval + split.eval, split.total);
            assert_eq!(split.prompt_eval, split.total / 4);
        }
    }

    #[test]
    fn created_at_has_no_subseconds() {
        let stamp = created_at();
        assert!(stamp.ends_with('Z'));
        assert!(!stamp.contains('.'));
    }
}
