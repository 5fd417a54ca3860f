use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ovai_protocol::gemini::{GenerationConfig, SafetySetting};

/// Built-in model defaults compiled into the binary.
const BUILTINS: &str = include_str!("model-defaults.json");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path} failed: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding {path} failed: {reason}")]
    Decode { path: String, reason: String },
    #[error("decoding built-in defaults failed: {0}")]
    Builtins(#[from] serde_json::Error),
    #[error("parsing private key failed: {0}")]
    PrivateKey(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeminiDefaults {
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

/// Read-only after init; shared by every handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Defaults {
    pub api_location: String,
    pub api_endpoint: String,
    pub gemini_defaults: GeminiDefaults,
}

impl Defaults {
    /// Parses the embedded defaults and overlays the file at `path` when it
    /// exists. A missing file is fine; an unreadable one is fatal.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut defaults: Defaults = serde_json::from_str(BUILTINS)?;
        match fs::read_to_string(path) {
            Ok(text) => {
                let overlay: Defaults =
                    serde_json::from_str(&text).map_err(|err| ConfigError::Decode {
                        path: path.to_string(),
                        reason: err.to_string(),
                    })?;
                defaults.overlay(&overlay);
                tracing::debug!(target: "ovai", "override defaults from {path}");
            }
            Err(err) => {
                tracing::debug!(target: "ovai", "reading {path} failed: {err}");
            }
        }
        Ok(defaults)
    }

    /// Monotone merge: a field of `other` replaces the base only when present.
    pub fn overlay(&mut self, other: &Defaults) {
        if !other.api_location.is_empty() {
            self.api_location = other.api_location.clone();
        }
        if !other.api_endpoint.is_empty() {
            self.api_endpoint = other.api_endpoint.clone();
        }
        self.gemini_defaults
            .generation_config
            .overlay(&other.gemini_defaults.generation_config);
        if !other.gemini_defaults.safety_settings.is_empty() {
            self.gemini_defaults.safety_settings = other.gemini_defaults.safety_settings.clone();
        }
    }
}

/// Reads a JSON file tolerating JSONC extensions (comments, trailing commas).
pub fn read_jsonc<T, P>(path: P) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    json5::from_str(&text).map_err(|err| ConfigError::Decode {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}
