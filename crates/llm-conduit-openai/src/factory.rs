//! Factory for building `OpenAI` providers from configuration.

use llm_conduit::registry::{ProviderConfig, ProviderFactory};
use llm_conduit::{DynProvider, LlmError, ProviderRegistry};

use crate::{OpenAiConfig, OpenAiProvider};

/// Builds [`OpenAiProvider`]s from a [`ProviderConfig`].
///
/// ```rust,no_run
/// use llm_conduit::ProviderRegistry;
/// use llm_conduit_openai::OpenAiFactory;
///
/// ProviderRegistry::global().register(Box::new(OpenAiFactory));
/// ```
///
/// # Configuration
///
/// | Field | Required | Description |
/// |-------|----------|-------------|
/// | `provider` | Yes | `"openai"` |
/// | `api_key` | Yes | API key |
/// | `model` | Yes | Model identifier |
/// | `base_url` | No | Any Chat Completions compatible endpoint |
/// | `timeout` | No | Request timeout |
/// | `json` | No | JSON backend for stream payloads |
/// | `extra.organization` | No | Organization ID |
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiFactory;

impl ProviderFactory for OpenAiFactory {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn DynProvider>, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("openai provider requires api_key".into()))?;

        if config.model.is_empty() {
            return Err(LlmError::InvalidRequest(
                "openai provider requires model".into(),
            ));
        }

        let mut openai_config = OpenAiConfig {
            api_key,
            model: config.model.clone(),
            timeout: config.timeout,
            json: config.json_or_default(),
            ..Default::default()
        };

        if let Some(base_url) = &config.base_url {
            openai_config.base_url.clone_from(base_url);
        }

        if let Some(organization) = config.get_extra_str("organization") {
            openai_config.organization = Some(organization.to_owned());
        }

        Ok(Box::new(OpenAiProvider::new(openai_config)))
    }
}

/// Registers [`OpenAiFactory`] with the global registry.
pub fn register_global() {
    ProviderRegistry::global().register(Box::new(OpenAiFactory));
}
