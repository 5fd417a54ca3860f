use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::pin::Pin;

use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outbound connections may be pinned to one address family; a single
/// process-wide policy fixed at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkPolicy {
    #[default]
    Any,
    Ipv4,
    Ipv6,
}

impl NetworkPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "IPV4" => Some(Self::Ipv4),
            "IPV6" => Some(Self::Ipv6),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub stream: bool,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            stream: false,
        }
    }

    pub fn post_json<T: serde::Serialize>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, GatewayError> {
        let encoded = serde_json::to_vec(body)
            .map_err(|err| {
                tracing::debug!(target: "ovai_net", "encoding request body failed: {err}");
                GatewayError::internal("preparing request failed")
            })?;
        Ok(Self::post_raw(url, Bytes::from(encoded)))
    }

    /// Forwards the byte-exact body, used by the proxy path.
    pub fn post_raw(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
            stream: false,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .push(("Authorization".to_string(), format!("Bearer {token}")));
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(mpsc::Receiver<Bytes>),
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: UpstreamBody,
}

/// Transport seam: route handlers and the credential store go through this
/// trait so tests can substitute a fake upstream.
pub trait UpstreamClient: Send + Sync {
    fn send<'a>(
        &'a self,
        req: UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamResponse, GatewayError>> + Send + 'a>>;
}

/// Executes a JSON request and decodes the body. On non-200 the provider's
/// message is extracted and surfaced at the provider's status code.
pub async fn dispatch<T: DeserializeOwned>(
    client: &dyn UpstreamClient,
    req: UpstreamRequest,
) -> Result<T, GatewayError> {
    let (status, body) = dispatch_raw(client, req).await?;
    serde_json::from_slice(&body).map_err(|err| {
        tracing::debug!(target: "ovai_net", "receive {status} with {} bytes", body.len());
        tracing::debug!(target: "ovai", "decoding response body failed: {err}");
        GatewayError::internal("decoding response body failed")
    })
}

/// Executes a request and returns the raw body bytes.
pub async fn dispatch_raw(
    client: &dyn UpstreamClient,
    req: UpstreamRequest,
) -> Result<(u16, Bytes), GatewayError> {
    let url = req.url.clone();
    let response = client.send(req).await?;
    let status = response.status;
    let body = match response.body {
        UpstreamBody::Bytes(body) => body,
        UpstreamBody::Stream(rx) => collect_stream(rx).await,
    };
    if status != 200 {
        tracing::debug!(target: "ovai_net", "receive {status} from {url}");
        return Err(GatewayError::upstream(status, read_error(status, &body)));
    }
    tracing::trace!(target: "ovai_net", "receive {status} from {url} with {} bytes", body.len());
    Ok((status, body))
}

/// Executes a request without consuming the body; the caller owns the
/// receiver. A non-2xx reply is buffered and surfaced as an error.
pub async fn begin_stream(
    client: &dyn UpstreamClient,
    req: UpstreamRequest,
) -> Result<mpsc::Receiver<Bytes>, GatewayError> {
    let response = client.send(req.streaming()).await?;
    let status = response.status;
    match response.body {
        UpstreamBody::Stream(rx) if (200..300).contains(&status) => Ok(rx),
        UpstreamBody::Stream(rx) => {
            let body = collect_stream(rx).await;
            Err(GatewayError::upstream(status, read_error(status, &body)))
        }
        UpstreamBody::Bytes(body) => {
            if (200..300).contains(&status) {
                let (tx, rx) = mpsc::channel(1);
                let _ = tx.try_send(body);
                Ok(rx)
            } else {
                Err(GatewayError::upstream(status, read_error(status, &body)))
            }
        }
    }
}

async fn collect_stream(mut rx: mpsc::Receiver<Bytes>) -> Bytes {
    let mut body = Vec::new();
    while let Some(chunk) = rx.recv().await {
        body.extend_from_slice(&chunk);
    }
    Bytes::from(body)
}

/// Extracts a human message from an upstream error envelope, trying the
/// known shapes in order and falling back to the raw body, then the status
/// line.
pub fn read_error(status: u16, body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct Nested {
        message: String,
    }
    #[derive(Deserialize)]
    struct Complex {
        error: Nested,
    }
    #[derive(Deserialize)]
    struct Described {
        error_description: String,
    }
    #[derive(Deserialize)]
    struct Simple {
        error: String,
    }

    if let Ok(complex) = serde_json::from_slice::<Complex>(body) {
        if !complex.error.message.is_empty() {
            return complex.error.message;
        }
    }
    if let Ok(described) = serde_json::from_slice::<Described>(body) {
        if !described.error_description.is_empty() {
            return described.error_description;
        }
    }
    if let Ok(simple) = serde_json::from_slice::<Simple>(body) {
        if !simple.error.is_empty() {
            return simple.error;
        }
    }
    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if !raw.is_empty() {
        return raw.to_string();
    }
    match http::StatusCode::from_u16(status).ok().and_then(|code| code.canonical_reason()) {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}

pub struct WreqClient {
    client: wreq::Client,
}

impl WreqClient {
    pub fn new(policy: NetworkPolicy) -> Result<Self, GatewayError> {
        let mut builder = wreq::Client::builder();
        builder = match policy {
            NetworkPolicy::Any => builder,
            NetworkPolicy::Ipv4 => builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            NetworkPolicy::Ipv6 => builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        };
        let client = builder
            .build()
            .map_err(|err| GatewayError::internal(err.to_string()))?;
        Ok(Self { client })
    }
}

impl UpstreamClient for WreqClient {
    fn send<'a>(
        &'a self,
        req: UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamResponse, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            let method = match req.method {
                HttpMethod::Get => wreq::Method::GET,
                HttpMethod::Post => wreq::Method::POST,
            };
            tracing::debug!(target: "ovai_net", "send {method} {}", req.url);
            let mut builder = self.client.request(method, &req.url);
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = req.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|err| {
                tracing::debug!(target: "ovai_net", "making request failed: {err}");
                GatewayError::internal("making request failed")
            })?;
            let status = response.status().as_u16();

            if !req.stream || !(200..300).contains(&status) {
                let body = response.bytes().await.map_err(|err| {
                    tracing::debug!(target: "ovai_net", "reading response body failed: {err}");
                    GatewayError::internal("reading response body failed")
                })?;
                return Ok(UpstreamResponse {
                    status,
                    body: UpstreamBody::Bytes(body),
                });
            }

            let (tx, rx) = mpsc::channel::<Bytes>(16);
            tokio::spawn(async move {
                let mut stream = response.bytes_stream();
                while let Some(item) = stream.next().await {
                    let Ok(chunk) = item else {
                        break;
                    };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
            });
            Ok(UpstreamResponse {
                status,
                body: UpstreamBody::Stream(rx),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_extraction_tries_shapes_in_order() {
        let body = br#"{"error":{"message":"quota exhausted"}}"#;
        assert_eq!(read_error(429, body), "quota exhausted");

        let body = br#"{"error_description":"invalid assertion"}"#;
        assert_eq!(read_error(400, body), "invalid assertion");

        let body = br#"{"error":"invalid_grant"}"#;
        assert_eq!(read_error(400, body), "invalid_grant");
    }

    #[test]
    fn error_extraction_falls_back_to_body_then_status() {
        assert_eq!(read_error(502, b"bad gateway page"), "bad gateway page");
        assert_eq!(read_error(401, b""), "401 Unauthorized");
    }

    #[test]
    fn network_policy_parses_env_values() {
        assert_eq!(NetworkPolicy::parse("IPV4"), Some(NetworkPolicy::Ipv4));
        assert_eq!(NetworkPolicy::parse("ipv6"), Some(NetworkPolicy::Ipv6));
        assert_eq!(NetworkPolicy::parse("dual"), None);
    }
}
