//! Ollama `Provider` implementation.

use std::collections::HashSet;
use std::sync::Arc;

use llm_conduit::provider::{Capability, ChatParams, Provider, ProviderMetadata};
use llm_conduit::stream::byte_stream;
use llm_conduit::{LlmError, Response, StreamingResponse};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::instrument;

use crate::config::OllamaConfig;
use crate::convert;
use crate::stream::OllamaDecoder;

/// Provider for a local or remote Ollama server.
///
/// No API key is needed.
///
/// # Example
///
/// ```rust,no_run
/// use llm_conduit::{ChatParams, Message, Provider};
/// use llm_conduit_ollama::{OllamaConfig, OllamaProvider};
///
/// # async fn example() -> Result<(), llm_conduit::LlmError> {
/// let provider = OllamaProvider::new(OllamaConfig::default());
///
/// let params = ChatParams {
///     messages: vec![Message::user("Hello!")],
///     ..Default::default()
/// };
/// let response = provider.generate(&params).await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OllamaProvider {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a provider from configuration.
    ///
    /// Reuses `config.client` when set.
    pub fn new(config: OllamaConfig) -> Self {
        let client = config.client.clone().unwrap_or_else(|| {
            let mut builder = reqwest::Client::builder();
            if let Some(timeout) = config.timeout {
                builder = builder.timeout(timeout);
            }
            builder.build().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            })
        });
        Self { config, client }
    }

    /// The configuration this provider was built with.
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/api/chat")
    }

    async fn send_request(
        &self,
        params: &ChatParams,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let request_body = convert::build_request(params, &self.config, stream)?;

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(extra) = &params.extra_headers {
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut req = self
            .client
            .post(self.chat_url())
            .headers(headers)
            .json(&request_body);

        if let Some(timeout) = params.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    elapsed_ms: params
                        .timeout
                        .or(self.config.timeout)
                        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                }
            } else {
                LlmError::Http {
                    status: e.status(),
                    message: e.to_string(),
                    retryable: e.is_connect(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "Ollama returned an error status");
            return Err(convert::convert_error(status, &body));
        }

        Ok(response)
    }
}

impl Provider for OllamaProvider {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn generate(&self, params: &ChatParams) -> Result<Response, LlmError> {
        let response = self.send_request(params, false).await?;

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to read Ollama response body: {e}"),
                raw: String::new(),
            })?;

        let value = self
            .config
            .json
            .parse(&body)
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to parse Ollama response: {e}"),
                raw: body.clone(),
            })?;
        let chunk: crate::types::ChatChunk =
            serde_json::from_value(value).map_err(|e| LlmError::ResponseFormat {
                message: format!("Unexpected Ollama response shape: {e}"),
                raw: body,
            })?;

        Ok(Response::from_body_with(
            convert::convert_response(chunk),
            self.config.json.as_ref(),
        ))
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn stream(&self, params: &ChatParams) -> Result<StreamingResponse, LlmError> {
        let response = self.send_request(params, true).await?;
        Ok(StreamingResponse::with_json_backend(
            byte_stream(response.bytes_stream()),
            Box::new(OllamaDecoder::new()),
            Arc::clone(&self.config.json),
        ))
    }

    fn metadata(&self) -> ProviderMetadata {
        let model = self.config.model.as_str();
        let mut capabilities = HashSet::from([Capability::Tools, Capability::Vision]);
        if supports_thinking(model) {
            capabilities.insert(Capability::Reasoning);
        }

        ProviderMetadata {
            name: "ollama".into(),
            model: model.to_owned(),
            context_window: context_window_for_model(model),
            capabilities,
        }
    }
}

/// Model families that emit a separate `thinking` field.
fn supports_thinking(model: &str) -> bool {
    ["deepseek-r1", "qwq", "qwen3", "gpt-oss"]
        .iter()
        .any(|family| model.starts_with(family))
}

/// Context window for known model families.
///
/// Unknown models get 128K; most current models support it.
fn context_window_for_model(model: &str) -> u64 {
    if model.starts_with("mistral") || model.starts_with("mixtral") {
        32_000
    } else if model.starts_with("gemma") {
        8_192
    } else {
        128_000
    }
}
