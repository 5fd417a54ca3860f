use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ovai_core::{
    AppState, Defaults, NetworkPolicy, ServiceAccount, TokenStore, UpstreamClient, WreqClient,
};

mod logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    tracing::debug!(target: "ovai", "version {VERSION}");

    let port: u16 = env_or("PORT", "22434").parse().context("invalid PORT")?;
    let account_path = env_or("OVAI_ACCOUNT", "google-account.json");
    let defaults_path = env_or("OVAI_DEFAULTS", "model-defaults.json");
    let network = std::env::var("NETWORK")
        .ok()
        .and_then(|value| NetworkPolicy::parse(&value))
        .unwrap_or_default();
    let ollama_origin = std::env::var("OLLAMA_ORIGIN")
        .ok()
        .filter(|value| !value.is_empty())
        .map(|value| value.trim_end_matches('/').to_string());

    let account = ServiceAccount::from_file(&account_path)?;
    let defaults = Defaults::load(&defaults_path)?;
    let client: Arc<dyn UpstreamClient> = Arc::new(WreqClient::new(network)?);
    let tokens = Arc::new(TokenStore::new(account, client.clone())?);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let state = Arc::new(AppState {
        defaults,
        tokens,
        client,
        ollama_origin,
        shutdown: shutdown_tx,
    });

    let app = ovai_router::router(state);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .context("listening failed")?;
    tracing::info!("listen on http://localhost:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await
        .context("serving failed")?;
    tracing::info!("shut server down");
    Ok(())
}

/// Resolves on SIGINT, SIGTERM or an administrative shutdown request.
async fn shutdown_signal(mut admin: mpsc::Receiver<()>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = admin.recv() => {},
    }
}
