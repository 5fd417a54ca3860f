use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use tokio::sync::mpsc;
use tower::ServiceExt;

use ovai_core::{
    AppState, Defaults, GatewayError, ServiceAccount, TokenStore, UpstreamBody, UpstreamClient,
    UpstreamRequest, UpstreamResponse,
};

const TEST_KEY: &str = include_str!("../../ovai-core/tests/fixtures/test-key.pem");

#[derive(Debug, Clone)]
enum FakeReply {
    Json(u16, String),
    Stream(u16, Vec<String>),
}

#[derive(Debug)]
struct RecordedRequest {
    url: String,
    bearer: Option<String>,
    body: Option<Bytes>,
}

/// Scripted transport: token-endpoint calls mint `tok-<n>` bearers, every
/// other URL pops the next canned reply.
struct FakeUpstream {
    exchanges: AtomicUsize,
    replies: Mutex<VecDeque<FakeReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeUpstream {
    fn new(replies: Vec<FakeReply>) -> Arc<Self> {
        Arc::new(Self {
            exchanges: AtomicUsize::new(0),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn model_requests(&self) -> Vec<(String, Option<String>, Option<Bytes>)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| !request.url.contains("oauth2"))
            .map(|request| (request.url.clone(), request.bearer.clone(), request.body.clone()))
            .collect()
    }
}

impl UpstreamClient for FakeUpstream {
    fn send<'a>(
        &'a self,
        req: UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamResponse, GatewayError>> + Send + 'a>> {
        let bearer = req.headers.iter().find_map(|(name, value)| {
            (name == "Authorization").then(|| value.trim_start_matches("Bearer ").to_string())
        });
        self.requests.lock().unwrap().push(RecordedRequest {
            url: req.url.clone(),
            bearer,
            body: req.body.clone(),
        });

        if req.url.contains("oauth2") {
            let count = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            let body = format!(r#"{{"access_token":"tok-{count}","expires_in":3600}}"#);
            return Box::pin(async move {
                Ok(UpstreamResponse {
                    status: 200,
                    body: UpstreamBody::Bytes(Bytes::from(body)),
                })
            });
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeReply::Json(500, "{\"error\":\"unscripted\"}".to_string()));
        Box::pin(async move {
            match reply {
                FakeReply::Json(status, body) => Ok(UpstreamResponse {
                    status,
                    body: UpstreamBody::Bytes(Bytes::from(body)),
                }),
                FakeReply::Stream(status, chunks) => {
                    let (tx, rx) = mpsc::channel(chunks.len().max(1));
                    for chunk in chunks {
                        let _ = tx.try_send(Bytes::from(chunk));
                    }
                    Ok(UpstreamResponse {
                        status,
                        body: UpstreamBody::Stream(rx),
                    })
                }
            }
        })
    }
}

fn test_account() -> ServiceAccount {
    ServiceAccount {
        project_id: "test-project".to_string(),
        private_key_id: "key-1".to_string(),
        private_key: TEST_KEY.to_string(),
        client_email: "svc@test-project.iam.gserviceaccount.com".to_string(),
        scope: None,
        token_uri: None,
    }
}

fn test_state(upstream: Arc<FakeUpstream>, ollama_origin: Option<&str>) -> Arc<AppState> {
    let client: Arc<dyn UpstreamClient> = upstream;
    let tokens = Arc::new(TokenStore::new(test_account(), client.clone()).unwrap());
    let (shutdown, _) = mpsc::channel(1);
    Arc::new(AppState {
        defaults: Defaults::load("missing-defaults.json").unwrap(),
        tokens,
        client,
        ollama_origin: ollama_origin.map(|origin| origin.to_string()),
        shutdown,
    })
}

async fn post_json(state: Arc<AppState>, uri: &str, body: &str) -> (StatusCode, String, String) {
    let app = ovai_router::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8_lossy(&body).into_owned())
}

fn generate_success_reply() -> FakeReply {
    FakeReply::Json(
        200,
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hello"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":1,"candidatesTokenCount":1}}"#
            .to_string(),
    )
}

#[tokio::test]
async fn generate_buffered_translates_the_reply() {
    let upstream = FakeUpstream::new(vec![generate_success_reply()]);
    let state = test_state(upstream.clone(), None);
    let (status, _, body) = post_json(
        state,
        "/api/generate",
        r#"{"model":"gemini-2.5-flash","prompt":"hi","stream":false}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let reply: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(reply["model"], "gemini-2.5-flash");
    assert_eq!(reply["response"], "hello");
    assert_eq!(reply["done"], true);
    assert_eq!(reply["done_reason"], "stop");
    assert_eq!(reply["prompt_eval_count"], 1);
    assert_eq!(reply["eval_count"], 1);
    assert_eq!(reply["load_duration"], 0);
    let total = reply["total_duration"].as_i64().unwrap();
    let prompt_eval = reply["prompt_eval_duration"].as_i64().unwrap();
    let eval = reply["eval_duration"].as_i64().unwrap();
    assert_eq!(prompt_eval + eval, total);
    assert_eq!(prompt_eval, total / 4);

    let requests = upstream.model_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].0.ends_with(
        "/projects/test-project/locations/us-central1/publishers/google/models/gemini-2.5-flash:generateContent"
    ));
    assert_eq!(requests[0].1.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn chat_streams_one_object_per_record() {
    let upstream = FakeUpstream::new(vec![FakeReply::Stream(
        200,
        vec![
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"mulling\",\"thought\":true}]}}]}\n".to_string(),
            // Two records in one read, the second split across reads.
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"he\"}]}}]}\ndata: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"llo\"}]}}]".to_string(),
            "}\n".to_string(),
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":2,\"candidatesTokenCount\":5}}\n".to_string(),
        ],
    )]);
    let state = test_state(upstream, None);
    let (status, content_type, body) = post_json(
        state,
        "/api/chat",
        r#"{"model":"gemini-2.5-pro","messages":[{"role":"user","content":"q"}],"think":"low","stream":true}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/json");
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 4);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["message"]["thinking"], "mulling");
    assert_eq!(first["done"], false);

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["message"]["content"], "he");

    let last: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
    assert_eq!(last["done"], true);
    assert_eq!(last["done_reason"], "stop");
    assert_eq!(last["prompt_eval_count"], 2);
    assert_eq!(last["eval_count"], 5);
    // The terminal object carries the thoughts seen across the stream.
    assert_eq!(last["message"]["thinking"], "mulling");
}

#[tokio::test]
async fn completions_stream_emits_sse_with_usage_and_done() {
    let upstream = FakeUpstream::new(vec![FakeReply::Stream(
        200,
        vec![
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"hi\"}]}}]}\n".to_string(),
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":1,\"candidatesTokenCount\":2}}\n".to_string(),
        ],
    )]);
    let state = test_state(upstream, None);
    let (status, content_type, body) = post_json(
        state,
        "/v1/chat/completions",
        r#"{"model":"gemini-2.5-flash","messages":[{"role":"user","content":"q"}],"stream":true,"stream_options":{"include_usage":true}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/event-stream");
    assert!(body.ends_with("data: [DONE]\n\n"));

    let records: Vec<&str> = body
        .split("\n\n")
        .filter(|record| !record.is_empty())
        .map(|record| record.strip_prefix("data: ").unwrap())
        .collect();
    assert_eq!(records.len(), 4);

    let first: serde_json::Value = serde_json::from_str(records[0]).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["choices"][0]["delta"]["content"], "hi");
    assert!(first["choices"][0]["finish_reason"].is_null());

    let second: serde_json::Value = serde_json::from_str(records[1]).unwrap();
    assert_eq!(second["choices"][0]["finish_reason"], "stop");

    let usage: serde_json::Value = serde_json::from_str(records[2]).unwrap();
    assert_eq!(usage["usage"]["prompt_tokens"], 1);
    assert_eq!(usage["usage"]["completion_tokens"], 2);
    assert_eq!(usage["usage"]["total_tokens"], 3);
}

#[tokio::test]
async fn a_401_forces_one_refresh_and_retry() {
    let upstream = FakeUpstream::new(vec![
        FakeReply::Json(401, r#"{"error":{"message":"expired token"}}"#.to_string()),
        generate_success_reply(),
    ]);
    let state = test_state(upstream.clone(), None);
    let (status, _, body) = post_json(
        state,
        "/api/generate",
        r#"{"model":"gemini-2.5-flash","prompt":"hi","stream":false}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let reply: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(reply["response"], "hello");

    // One exchange up front, one forced by the 401.
    assert_eq!(upstream.exchange_count(), 2);
    let requests = upstream.model_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].1.as_deref(), Some("tok-1"));
    assert_eq!(requests[1].1.as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn other_upstream_errors_pass_through() {
    let upstream = FakeUpstream::new(vec![FakeReply::Json(
        429,
        r#"{"error":{"message":"quota exhausted"}}"#.to_string(),
    )]);
    let state = test_state(upstream, None);
    let (status, _, body) = post_json(
        state,
        "/api/generate",
        r#"{"model":"gemini-2.5-flash","prompt":"hi","stream":false}"#,
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, r#"{"error":"quota exhausted"}"#);
}

#[tokio::test]
async fn bad_data_uri_is_rejected() {
    let upstream = FakeUpstream::new(Vec::new());
    let state = test_state(upstream, None);
    let (status, _, body) = post_json(
        state,
        "/v1/chat/completions",
        r#"{"model":"gemini-2.5-flash","messages":[{"role":"user","content":[{"type":"image_url","image_url":{"url":"http://x"}}]}]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"invalid data URI prefix: http:"}"#);
}

#[tokio::test]
async fn validation_errors_are_400s() {
    let upstream = FakeUpstream::new(Vec::new());
    let state = test_state(upstream, None);

    let (status, _, body) = post_json(state.clone(), "/api/generate", r#"{"prompt":"hi"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"model missing"}"#);

    let (status, _, body) = post_json(
        state.clone(),
        "/api/chat",
        r#"{"model":"gemini-2.5-flash"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"messages missing"}"#);

    // No proxy configured: unknown model families are rejected.
    let (status, _, body) = post_json(
        state,
        "/api/chat",
        r#"{"model":"llama3","messages":[{"role":"user","content":"q"}],"stream":false}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"unrecognised model \"llama3\""}"#);
}

#[tokio::test]
async fn proxy_forwards_the_exact_bytes() {
    let upstream = FakeUpstream::new(vec![FakeReply::Json(
        200,
        r#"{"message":{"role":"assistant","content":"hi"},"done":true}"#.to_string(),
    )]);
    let state = test_state(upstream.clone(), Some("http://upstream:11434"));
    let payload = r#"{"model":"llama3","messages":[{"role":"user","content":"q"}],"stream":false}"#;
    let (status, content_type, body) = post_json(state, "/api/chat", payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/json");
    assert_eq!(
        body,
        r#"{"message":{"role":"assistant","content":"hi"},"done":true}"#
    );

    let requests = upstream.model_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "http://upstream:11434/api/chat");
    assert_eq!(requests[0].2.as_deref(), Some(payload.as_bytes()));
}

#[tokio::test]
async fn proxy_reframes_stream_for_event_stream_clients() {
    let upstream = FakeUpstream::new(vec![FakeReply::Stream(
        200,
        vec![r#"{"done":false}"#.to_string(), r#"{"done":true}"#.to_string()],
    )]);
    let state = test_state(upstream, Some("http://upstream:11434"));
    let app = ovai_router::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header(header::ACCEPT, "text/event-stream")
                .body(Body::from(r#"{"model":"llama3","prompt":"q"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/event-stream")
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        body.as_ref(),
        b"data: {\"done\":false}\n\ndata: {\"done\":true}\n\n"
    );
}

#[tokio::test]
async fn listing_endpoints_serve_the_catalog() {
    let upstream = FakeUpstream::new(Vec::new());
    let state = test_state(upstream, None);
    let app = ovai_router::router(state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/tags")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let tags: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let models = tags["models"].as_array().unwrap();
    assert!(
        models
            .iter()
            .any(|model| model["name"] == "gemini-2.5-flash")
    );
    assert!(models.iter().all(|model| model["size"].is_i64()));

    let app = ovai_router::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let listing: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listing["object"], "list");
    assert_eq!(listing["data"][0]["owned_by"], "ovai");
}

#[tokio::test]
async fn show_returns_catalog_details() {
    let upstream = FakeUpstream::new(Vec::new());
    let state = test_state(upstream, None);
    let (status, _, body) =
        post_json(state.clone(), "/api/show", r#"{"name":"gemini-2.5-pro"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let details: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(details["details"]["family"], "gemini-2.5-pro");

    let (status, _, body) = post_json(state, "/api/show", r#"{"name":"gemini-9"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"unrecognised model \"gemini-9\""}"#);
}

#[tokio::test]
async fn preflight_echoes_cors_headers() {
    let upstream = FakeUpstream::new(Vec::new());
    let state = test_state(upstream, None);
    let app = ovai_router::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/chat")
                .header(header::ORIGIN, "http://example.org")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("http://example.org")
    );
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|value| value.to_str().ok()),
        Some("content-type")
    );
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert_eq!(
        headers.get(header::VARY).and_then(|value| value.to_str().ok()),
        Some("Origin")
    );
}

#[tokio::test]
async fn wrong_method_gets_405_with_allow() {
    let upstream = FakeUpstream::new(Vec::new());
    let state = test_state(upstream, None);
    let app = ovai_router::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key(header::ALLOW));
}

#[tokio::test]
async fn liveness_endpoints_answer() {
    let upstream = FakeUpstream::new(Vec::new());
    let state = test_state(upstream, None);
    let app = ovai_router::router(state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = ovai_router::router(state);
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), b"Ollama is running");
}

#[tokio::test]
async fn shutdown_endpoint_signals_the_channel() {
    let upstream = FakeUpstream::new(Vec::new());
    let client: Arc<dyn UpstreamClient> = upstream;
    let tokens = Arc::new(TokenStore::new(test_account(), client.clone()).unwrap());
    let (shutdown, mut shutdown_rx) = mpsc::channel(1);
    let state = Arc::new(AppState {
        defaults: Defaults::load("missing-defaults.json").unwrap(),
        tokens,
        client,
        ollama_origin: None,
        shutdown,
    });

    let app = ovai_router::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/shutdown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(shutdown_rx.try_recv().is_ok());
}
