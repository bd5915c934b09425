//! Factory for building Anthropic providers from configuration.

use llm_conduit::registry::{ProviderConfig, ProviderFactory};
use llm_conduit::{DynProvider, LlmError, ProviderRegistry};

use crate::{AnthropicConfig, AnthropicProvider};

/// Builds [`AnthropicProvider`]s from a [`ProviderConfig`].
///
/// # Configuration
///
/// | Field | Required | Description |
/// |-------|----------|-------------|
/// | `provider` | Yes | `"anthropic"` |
/// | `api_key` | Yes | API key |
/// | `model` | Yes | Model identifier |
/// | `base_url` | No | Custom endpoint |
/// | `timeout` | No | Request timeout |
/// | `json` | No | JSON backend for stream payloads |
/// | `extra.max_tokens` | No | Default `max_tokens` |
/// | `extra.api_version` | No | `anthropic-version` header |
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicFactory;

impl ProviderFactory for AnthropicFactory {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn DynProvider>, LlmError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::InvalidRequest("anthropic provider requires api_key".into())
        })?;

        if config.model.is_empty() {
            return Err(LlmError::InvalidRequest(
                "anthropic provider requires model".into(),
            ));
        }

        let mut anthropic_config = AnthropicConfig {
            api_key,
            model: config.model.clone(),
            timeout: config.timeout,
            json: config.json_or_default(),
            ..Default::default()
        };

        if let Some(base_url) = &config.base_url {
            anthropic_config.base_url.clone_from(base_url);
        }
        if let Some(max_tokens) = config.get_extra_u64("max_tokens") {
            anthropic_config.max_tokens = u32::try_from(max_tokens).map_err(|_| {
                LlmError::InvalidRequest(format!("max_tokens out of range: {max_tokens}"))
            })?;
        }
        if let Some(version) = config.get_extra_str("api_version") {
            anthropic_config.api_version = version.to_owned();
        }

        Ok(Box::new(AnthropicProvider::new(anthropic_config)))
    }
}

/// Registers [`AnthropicFactory`] with the global registry.
pub fn register_global() {
    ProviderRegistry::global().register(Box::new(AnthropicFactory));
}
