//! Ollama provider configuration.

use std::sync::Arc;
use std::time::Duration;

use llm_conduit::json::{JsonBackend, default_backend};

/// Configuration for the Ollama provider.
///
/// ```rust
/// use llm_conduit_ollama::OllamaConfig;
///
/// let config = OllamaConfig {
///     model: "qwen3".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Model identifier (e.g. `"llama3.2"`, `"mistral"`).
    pub model: String,
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Shared HTTP client. A new one is built when `None`.
    pub client: Option<reqwest::Client>,
    /// JSON backend for stream lines.
    pub json: Arc<dyn JsonBackend>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            base_url: "http://localhost:11434".into(),
            timeout: None,
            client: None,
            json: default_backend(),
        }
    }
}
