//! `OpenAI` `Provider` implementation.

use std::collections::HashSet;
use std::sync::Arc;

use llm_conduit::provider::{Capability, ChatParams, Provider, ProviderMetadata};
use llm_conduit::stream::byte_stream;
use llm_conduit::{LlmError, Response, StreamingResponse};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::instrument;

use crate::config::OpenAiConfig;
use crate::convert;
use crate::stream::OpenAiDecoder;

/// `OpenAI` Chat Completions provider.
///
/// # Example
///
/// ```rust,no_run
/// use llm_conduit::{ChatParams, Message, Provider};
/// use llm_conduit_openai::{OpenAiConfig, OpenAiProvider};
///
/// # async fn example() -> Result<(), llm_conduit::LlmError> {
/// let provider = OpenAiProvider::new(OpenAiConfig {
///     api_key: std::env::var("OPENAI_API_KEY").unwrap(),
///     ..Default::default()
/// });
///
/// let response = provider
///     .stream(&ChatParams {
///         messages: vec![Message::user("Hello!")],
///         ..Default::default()
///     })
///     .await?
///     .collect()
///     .await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a provider from configuration.
    ///
    /// Reuses `config.client` when set; otherwise builds a client with the
    /// configured timeout.
    pub fn new(config: OpenAiConfig) -> Self {
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
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn default_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            "authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|_| LlmError::Auth("API key contains invalid header characters".into()))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        if let Some(org) = &self.config.organization {
            headers.insert(
                "openai-organization",
                HeaderValue::from_str(org).map_err(|_| {
                    LlmError::InvalidRequest(
                        "Organization ID contains invalid header characters".into(),
                    )
                })?,
            );
        }

        Ok(headers)
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Sends the request. An error status is converted to
    /// [`LlmError::Api`] before any body is handed back.
    async fn send_request(
        &self,
        params: &ChatParams,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let request_body = convert::build_request(params, &self.config, stream)?;

        let mut headers = self.default_headers()?;
        if let Some(extra) = &params.extra_headers {
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut req = self
            .client
            .post(self.completions_url())
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
                    retryable: e.is_connect() || e.is_timeout(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "OpenAI returned an error status");
            return Err(convert::convert_error(status, &body));
        }

        Ok(response)
    }
}

impl Provider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn generate(&self, params: &ChatParams) -> Result<Response, LlmError> {
        let response = self.send_request(params, false).await?;

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to read OpenAI response body: {e}"),
                raw: String::new(),
            })?;

        let value = self
            .config
            .json
            .parse(&body)
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to parse OpenAI response: {e}"),
                raw: body.clone(),
            })?;
        let api_response: crate::types::Response =
            serde_json::from_value(value).map_err(|e| LlmError::ResponseFormat {
                message: format!("Unexpected OpenAI response shape: {e}"),
                raw: body,
            })?;

        Ok(Response::from_body_with(
            convert::convert_response(api_response),
            self.config.json.as_ref(),
        ))
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn stream(&self, params: &ChatParams) -> Result<StreamingResponse, LlmError> {
        let response = self.send_request(params, true).await?;
        Ok(StreamingResponse::with_json_backend(
            byte_stream(response.bytes_stream()),
            Box::new(OpenAiDecoder::new()),
            Arc::clone(&self.config.json),
        ))
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut capabilities = HashSet::from([Capability::Tools, Capability::Vision]);

        if is_reasoning_model(&self.config.model) {
            capabilities.insert(Capability::Reasoning);
        }
        if self.config.model.contains("search") {
            capabilities.insert(Capability::Citations);
        }

        ProviderMetadata {
            name: "openai".into(),
            model: self.config.model.clone(),
            context_window: context_window_for_model(&self.config.model),
            capabilities,
        }
    }
}

fn is_reasoning_model(model: &str) -> bool {
    ["o1", "o3", "o4", "gpt-5"]
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

/// Context window sizes for known `OpenAI` models.
fn context_window_for_model(model: &str) -> u64 {
    if model.starts_with("gpt-4.1") {
        1_047_576
    } else if model.starts_with("gpt-5") {
        400_000
    } else if model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4") {
        200_000
    } else if model.starts_with("gpt-3.5") {
        16_385
    } else {
        128_000
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_metadata() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            model: "gpt-4o".into(),
            ..Default::default()
        });
        let meta = provider.metadata();

        assert_eq!(meta.name, "openai");
        assert_eq!(meta.model, "gpt-4o");
        assert_eq!(meta.context_window, 128_000);
        assert!(meta.capabilities.contains(&Capability::Tools));
        assert!(meta.capabilities.contains(&Capability::Vision));
        assert!(!meta.capabilities.contains(&Capability::Reasoning));
    }

    #[test]
    fn test_metadata_reasoning_model() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            model: "o3-mini".into(),
            ..Default::default()
        });
        let meta = provider.metadata();

        assert!(meta.capabilities.contains(&Capability::Reasoning));
        assert_eq!(meta.context_window, 200_000);
    }

    #[test]
    fn test_context_windows() {
        assert_eq!(context_window_for_model("gpt-4o-mini"), 128_000);
        assert_eq!(context_window_for_model("gpt-4.1-nano"), 1_047_576);
        assert_eq!(context_window_for_model("gpt-3.5-turbo"), 16_385);
        assert_eq!(context_window_for_model("some-local-model"), 128_000);
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..Default::default()
        });
        assert_eq!(
            provider.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_default_headers() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: "sk-test".into(),
            organization: Some("org-abc".into()),
            ..Default::default()
        });
        let headers = provider.default_headers().unwrap();

        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
        assert_eq!(headers.get("openai-organization").unwrap(), "org-abc");
    }

    #[test]
    fn test_default_headers_invalid_key() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: "invalid\nkey".into(),
            ..Default::default()
        });
        let err = provider.default_headers().unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
    }

    #[test]
    fn test_new_with_custom_client() {
        let custom_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        let provider = OpenAiProvider::new(OpenAiConfig {
            client: Some(custom_client),
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        assert_eq!(provider.metadata().name, "openai");
        assert_eq!(provider.config().timeout, Some(Duration::from_secs(30)));
    }
}
