//! Factory for building Gemini providers from configuration.

use llm_conduit::registry::{ProviderConfig, ProviderFactory};
use llm_conduit::{DynProvider, LlmError, ProviderRegistry};

use crate::{GeminiConfig, GeminiProvider};

/// Builds [`GeminiProvider`]s from a [`ProviderConfig`].
///
/// | Field | Required | Description |
/// |-------|----------|-------------|
/// | `provider` | Yes | `"gemini"` |
/// | `api_key` | Yes | API key |
/// | `model` | Yes | Model identifier |
/// | `base_url` | No | Custom endpoint |
/// | `timeout` | No | Request timeout |
/// | `json` | No | JSON backend for stream payloads |
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiFactory;

impl ProviderFactory for GeminiFactory {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn DynProvider>, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("gemini provider requires api_key".into()))?;

        if config.model.is_empty() {
            return Err(LlmError::InvalidRequest(
                "gemini provider requires model".into(),
            ));
        }

        let mut gemini_config = GeminiConfig {
            api_key,
            model: config.model.clone(),
            timeout: config.timeout,
            json: config.json_or_default(),
            ..Default::default()
        };
        if let Some(base_url) = &config.base_url {
            gemini_config.base_url.clone_from(base_url);
        }

        Ok(Box::new(GeminiProvider::new(gemini_config)))
    }
}

/// Registers [`GeminiFactory`] with the global registry.
pub fn register_global() {
    ProviderRegistry::global().register(Box::new(GeminiFactory));
}
