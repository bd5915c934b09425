//! Gemini `Provider` implementation.

use std::collections::HashSet;
use std::sync::Arc;

use llm_conduit::provider::{Capability, ChatParams, Provider, ProviderMetadata};
use llm_conduit::stream::byte_stream;
use llm_conduit::{LlmError, Response, StreamingResponse};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::instrument;

use crate::config::GeminiConfig;
use crate::convert;
use crate::stream::GeminiDecoder;

/// Google Gemini provider.
///
/// # Example
///
/// ```rust,no_run
/// use llm_conduit::{ChatParams, Message, Provider};
/// use llm_conduit_gemini::{GeminiConfig, GeminiProvider};
///
/// # async fn example() -> Result<(), llm_conduit::LlmError> {
/// let provider = GeminiProvider::new(GeminiConfig {
///     api_key: std::env::var("GEMINI_API_KEY").unwrap(),
///     ..Default::default()
/// });
///
/// let params = ChatParams {
///     messages: vec![Message::user("Hello!")],
///     ..Default::default()
/// };
/// let response = provider.stream(&params).await?.collect().await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a provider from configuration.
    ///
    /// Reuses `config.client` when set.
    pub fn new(config: GeminiConfig) -> Self {
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
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn default_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|_| LlmError::Auth("API key contains invalid header characters".into()))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn endpoint_url(&self, stream: bool) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let model = self.config.model_name();
        if stream {
            format!("{base}/v1beta/models/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("{base}/v1beta/models/{model}:generateContent")
        }
    }

    async fn send_request(
        &self,
        params: &ChatParams,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let request_body = convert::build_request(params)?;

        let mut headers = self.default_headers()?;
        if let Some(extra) = &params.extra_headers {
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut req = self
            .client
            .post(self.endpoint_url(stream))
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
            tracing::debug!(%status, "Gemini returned an error status");
            return Err(convert::convert_error(status, &body));
        }

        Ok(response)
    }
}

impl Provider for GeminiProvider {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn generate(&self, params: &ChatParams) -> Result<Response, LlmError> {
        let response = self.send_request(params, false).await?;

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to read Gemini response body: {e}"),
                raw: String::new(),
            })?;

        let value = self
            .config
            .json
            .parse(&body)
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to parse Gemini response: {e}"),
                raw: body.clone(),
            })?;
        let api_response: crate::types::GenerateResponse =
            serde_json::from_value(value).map_err(|e| LlmError::ResponseFormat {
                message: format!("Unexpected Gemini response shape: {e}"),
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
            Box::new(GeminiDecoder::new()),
            Arc::clone(&self.config.json),
        ))
    }

    fn metadata(&self) -> ProviderMetadata {
        let model = self.config.model_name();
        let mut capabilities = HashSet::from([
            Capability::Tools,
            Capability::Vision,
            Capability::Citations,
        ]);
        if supports_thinking(model) {
            capabilities.insert(Capability::Reasoning);
        }

        ProviderMetadata {
            name: "gemini".into(),
            model: model.to_owned(),
            context_window: context_window_for_model(model),
            capabilities,
        }
    }
}

fn supports_thinking(model: &str) -> bool {
    !(model.starts_with("gemini-1") || model.starts_with("gemini-2.0"))
        || model.contains("thinking")
}

fn context_window_for_model(model: &str) -> u64 {
    if model.starts_with("gemini-1.5-pro") {
        2_097_152
    } else {
        1_048_576
    }
}
