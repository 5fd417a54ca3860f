use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::client::{UpstreamClient, UpstreamRequest, dispatch};
use crate::config::{ConfigError, read_jsonc};
use crate::error::GatewayError;

const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://www.googleapis.com/oauth2/v4/token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Seconds subtracted from the reported lifetime before caching.
const EXPIRY_SKEW: u64 = 20;
/// Seconds the issued-at claim is backdated to tolerate clock skew.
const ISSUED_AT_SKEW: u64 = 10;
const ASSERTION_LIFETIME: u64 = 3600;

/// Immutable service-account material, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccount {
    /// Reads the key file, tolerating JSONC comments and trailing commas.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        read_jsonc(path)
    }

    pub fn scope(&self) -> &str {
        self.scope
            .as_deref()
            .filter(|scope| !scope.is_empty())
            .unwrap_or(DEFAULT_SCOPE)
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// An opaque bearer and the instant it stops being reusable.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub bearer: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Serialize)]
struct Claims {
    iat: u64,
    exp: u64,
    scope: String,
    aud: String,
    iss: String,
}

#[derive(Serialize)]
struct ExchangeRequest {
    grant_type: &'static str,
    assertion: String,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
    expires_in: u64,
}

/// Signs service-account assertions and caches the exchanged bearer. The
/// cache is the only mutable process-wide state on the hot path; the mutex
/// keeps (bearer, expiry) consistent and coalesces concurrent refreshes
/// into a single in-flight exchange.
pub struct TokenStore {
    account: ServiceAccount,
    signing_key: EncodingKey,
    client: Arc<dyn UpstreamClient>,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenStore {
    /// Fails when the PEM block parses as neither PKCS#8 nor PKCS#1.
    pub fn new(
        account: ServiceAccount,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, ConfigError> {
        let signing_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
        Ok(Self {
            account,
            signing_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    /// Returns the cached bearer while it is still valid, refreshing
    /// otherwise. Never returns an expired token.
    pub async fn use_access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.bearer.clone());
            }
        }
        self.exchange(&mut cached).await
    }

    /// Unconditionally signs a fresh assertion and replaces the cache.
    pub async fn refresh(&self) -> Result<String, GatewayError> {
        let mut cached = self.cached.lock().await;
        self.exchange(&mut cached).await
    }

    async fn exchange(&self, cached: &mut Option<AccessToken>) -> Result<String, GatewayError> {
        let assertion = self.assertion()?;
        let request = UpstreamRequest::post_json(
            self.account.token_uri(),
            &ExchangeRequest {
                grant_type: GRANT_TYPE,
                assertion,
            },
        )?;
        let token: ExchangeResponse = dispatch(self.client.as_ref(), request).await?;
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(EXPIRY_SKEW));
        tracing::debug!(
            target: "ovai",
            "got access with {} characters for {}s",
            token.access_token.len(),
            lifetime.as_secs()
        );
        *cached = Some(AccessToken {
            bearer: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn assertion(&self) -> Result<String, GatewayError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| GatewayError::internal(err.to_string()))?
            .as_secs();
        let iat = now - ISSUED_AT_SKEW;
        let claims = Claims {
            iat,
            exp: iat + ASSERTION_LIFETIME,
            scope: self.account.scope().to_string(),
            aud: self.account.token_uri().to_string(),
            iss: self.account.client_email.clone(),
        };
        let mut header = Header {
            alg: Algorithm::RS256,
            ..Header::default()
        };
        if !self.account.private_key_id.is_empty() {
            header.kid = Some(self.account.private_key_id.clone());
        }
        jsonwebtoken::encode(&header, &claims, &self.signing_key).map_err(|err| {
            tracing::debug!(target: "ovai", "signing token failed: {err}");
            GatewayError::internal("signing token failed")
        })
    }
}
