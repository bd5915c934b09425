//! `OpenAI` provider configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use llm_conduit::json::{JsonBackend, default_backend};

/// Configuration for the `OpenAI` provider.
///
/// ```rust
/// use llm_conduit_openai::OpenAiConfig;
///
/// let config = OpenAiConfig {
///     api_key: "sk-...".into(),
///     model: "gpt-4o-mini".into(),
///     ..Default::default()
/// };
/// ```
///
/// `base_url` can point at any Chat Completions compatible server
/// (Azure, vLLM, LM Studio, a proxy).
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key, sent as a bearer token.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base URL, up to and including the version segment.
    pub base_url: String,
    /// Optional `OpenAI-Organization` header.
    pub organization: Option<String>,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Shared HTTP client. A new one is built when `None`.
    pub client: Option<reqwest::Client>,
    /// JSON backend for stream payloads.
    pub json: Arc<dyn JsonBackend>,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .field("client", &self.client.as_ref().map(|_| "..."))
            .field("json", &self.json)
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            organization: None,
            timeout: None,
            client: None,
            json: default_backend(),
        }
    }
}
