//! Anthropic provider configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use llm_conduit::json::{JsonBackend, default_backend};

/// Configuration for the Anthropic provider.
///
/// ```rust
/// use llm_conduit_anthropic::AnthropicConfig;
///
/// let config = AnthropicConfig {
///     api_key: "sk-ant-...".into(),
///     model: "claude-sonnet-4-20250514".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API key, sent as `x-api-key`.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base URL, without the `/v1` segment.
    pub base_url: String,
    /// `max_tokens` used when `ChatParams::max_tokens` is unset. The
    /// Messages API requires one.
    pub max_tokens: u32,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Shared HTTP client. A new one is built when `None`.
    pub client: Option<reqwest::Client>,
    /// JSON backend for stream payloads.
    pub json: Arc<dyn JsonBackend>,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("client", &self.client.as_ref().map(|_| "..."))
            .field("json", &self.json)
            .finish()
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".into(),
            base_url: "https://api.anthropic.com".into(),
            max_tokens: 4096,
            api_version: "2023-06-01".into(),
            timeout: None,
            client: None,
            json: default_backend(),
        }
    }
}
