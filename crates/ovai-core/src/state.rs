use std::sync::Arc;

use tokio::sync::mpsc;

use crate::auth::TokenStore;
use crate::client::UpstreamClient;
use crate::config::Defaults;

/// Process-wide context threaded through the route handlers. Everything but
/// the token cache inside `tokens` is read-only after init.
pub struct AppState {
    pub defaults: Defaults,
    pub tokens: Arc<TokenStore>,
    pub client: Arc<dyn UpstreamClient>,
    /// Origin of the fallback assistant server; enables the proxy path.
    pub ollama_origin: Option<String>,
    pub shutdown: mpsc::Sender<()>,
}

impl AppState {
    pub fn can_proxy(&self) -> bool {
        self.ollama_origin.is_some()
    }

    pub fn project_id(&self) -> &str {
        self.tokens.project_id()
    }
}
