pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod state;

pub use auth::{AccessToken, ServiceAccount, TokenStore};
pub use client::{
    HttpMethod, NetworkPolicy, UpstreamBody, UpstreamClient, UpstreamRequest, UpstreamResponse,
    WreqClient, begin_stream, dispatch, dispatch_raw,
};
pub use config::{ConfigError, Defaults, GeminiDefaults};
pub use error::GatewayError;
pub use state::AppState;
