//! Factory for building Ollama providers from configuration.

use llm_conduit::registry::{ProviderConfig, ProviderFactory};
use llm_conduit::{DynProvider, LlmError, ProviderRegistry};

use crate::{OllamaConfig, OllamaProvider};

/// Builds [`OllamaProvider`]s from a [`ProviderConfig`].
///
/// | Field | Required | Description |
/// |-------|----------|-------------|
/// | `provider` | Yes | `"ollama"` |
/// | `model` | Yes | Model tag, e.g. `"llama3.2"` |
/// | `base_url` | No | Server URL, default `http://localhost:11434` |
/// | `timeout` | No | Request timeout |
/// | `json` | No | JSON backend for stream lines |
///
/// `api_key` is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaFactory;

impl ProviderFactory for OllamaFactory {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn DynProvider>, LlmError> {
        if config.model.is_empty() {
            return Err(LlmError::InvalidRequest(
                "ollama provider requires model".into(),
            ));
        }

        let mut ollama_config = OllamaConfig {
            model: config.model.clone(),
            timeout: config.timeout,
            json: config.json_or_default(),
            ..Default::default()
        };
        if let Some(base_url) = &config.base_url {
            ollama_config.base_url.clone_from(base_url);
        }

        Ok(Box::new(OllamaProvider::new(ollama_config)))
    }
}

/// Registers [`OllamaFactory`] with the global registry.
pub fn register_global() {
    ProviderRegistry::global().register(Box::new(OllamaFactory));
}
