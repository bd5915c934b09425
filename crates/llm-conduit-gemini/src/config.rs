//! Gemini provider configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use llm_conduit::json::{JsonBackend, default_backend};

/// Configuration for the Gemini provider.
///
/// ```rust
/// use llm_conduit_gemini::GeminiConfig;
///
/// let config = GeminiConfig {
///     api_key: "AIza...".into(),
///     model: "gemini-2.5-pro".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key, sent as `x-goog-api-key`.
    pub api_key: String,
    /// Model identifier, with or without the `models/` prefix.
    pub model: String,
    /// Base URL, without the `/v1beta` segment.
    pub base_url: String,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Shared HTTP client. A new one is built when `None`.
    pub client: Option<reqwest::Client>,
    /// JSON backend for stream payloads.
    pub json: Arc<dyn JsonBackend>,
}

impl GeminiConfig {
    /// The model name without any `models/` prefix.
    pub fn model_name(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("client", &self.client.as_ref().map(|_| "..."))
            .field("json", &self.json)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            timeout: None,
            client: None,
            json: default_backend(),
        }
    }
}
