use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use ovai_core::AppState;

mod catalog;
mod chat;
mod completions;
mod embed;
mod forward;
mod generate;
mod misc;
mod proxy;
mod respond;
mod show;
mod shutdown;
mod tags;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat::handle))
        .route("/api/embed", post(embed::handle_embed))
        .route("/api/embeddings", post(embed::handle_embeddings))
        .route("/api/generate", post(generate::handle))
        .route("/api/ping", get(misc::ping))
        .route("/api/show", post(show::handle))
        .route("/api/shutdown", post(shutdown::handle))
        .route("/api/tags", get(tags::handle_tags))
        .route("/v1/chat/completions", post(completions::handle))
        .route("/v1/models", get(tags::handle_models))
        .route("/", get(misc::root))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Echoes the caller's origin, answers preflights and logs the exchange.
async fn cors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::debug!(target: "ovai_srv", "request {method} {uri}");

    let origin = req.headers().get(header::ORIGIN).cloned();
    let requested_method = req
        .headers()
        .get(header::ACCESS_CONTROL_REQUEST_METHOD)
        .cloned();
    let requested_headers = req
        .headers()
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned();

    let mut response = if method == Method::OPTIONS {
        tracing::debug!(target: "ovai", ": preflight");
        let mut response = ().into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        response
    } else {
        next.run(req).await
    };

    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        if requested_method.is_some() {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, HEAD, POST, OPTIONS"),
            );
        }
        if let Some(requested) = requested_headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested);
        }
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }

    let status = response.status().as_u16();
    if status < 400 {
        tracing::debug!(target: "ovai_srv", "respond {status}: {method} {uri}");
    } else {
        tracing::debug!(target: "ovai", "fail {status}: {method} {uri}");
    }
    response
}
