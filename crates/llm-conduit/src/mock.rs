//! Mock provider for testing.
//!
//! [`MockProvider`] is a queue-based fake: tests decide exactly what
//! each `generate` and `stream` call returns, without a network. Queued
//! streams are raw body bytes run through a real [`StreamDecoder`], so
//! code under test sees the same pipeline a live provider drives.
//!
//! ```rust,no_run
//! use llm_conduit::mock::MockProvider;
//! use llm_conduit::test_helpers::{mock_for, sample_response};
//! use llm_conduit::{ChatParams, Provider};
//!
//! # async fn example() {
//! let mock = mock_for("test", "test-model");
//! mock.queue_response(sample_response("Hello!"));
//!
//! let resp = mock.generate(&ChatParams::default()).await.unwrap();
//! assert_eq!(resp.text(), "Hello!");
//! assert_eq!(mock.recorded_calls().len(), 1);
//! # }
//! ```
//!
//! [`LlmError`] is not `Clone`, so queues hold the cloneable
//! [`MockError`] and convert it when popped.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::decoder::StreamDecoder;
use crate::error::{ApiError, LlmError};
use crate::json::default_backend;
use crate::provider::{ChatParams, Provider, ProviderMetadata};
use crate::response::Response;
use crate::stream::{ByteStream, StreamingResponse};

/// Cloneable mirror of the common [`LlmError`] variants.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Maps to [`LlmError::Http`].
    Http {
        /// HTTP status code, if any.
        status: Option<http::StatusCode>,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::Api`], classified from the status.
    Api {
        /// HTTP status code.
        status: http::StatusCode,
        /// Provider error code.
        code: Option<String>,
        /// Error message.
        message: String,
    },
    /// Maps to [`LlmError::Auth`].
    Auth(String),
    /// Maps to [`LlmError::InvalidRequest`].
    InvalidRequest(String),
    /// Maps to [`LlmError::Timeout`].
    Timeout {
        /// Elapsed milliseconds.
        elapsed_ms: u64,
    },
    /// Maps to [`LlmError::ResponseFormat`].
    ResponseFormat {
        /// What went wrong during parsing.
        message: String,
        /// The raw payload.
        raw: String,
    },
}

impl MockError {
    /// Converts to the real error type.
    pub fn into_llm_error(self) -> LlmError {
        match self {
            Self::Http {
                status,
                message,
                retryable,
            } => LlmError::Http {
                status,
                message,
                retryable,
            },
            Self::Api {
                status,
                code,
                message,
            } => LlmError::Api(ApiError::new(status, code, message.clone(), message)),
            Self::Auth(msg) => LlmError::Auth(msg),
            Self::InvalidRequest(msg) => LlmError::InvalidRequest(msg),
            Self::Timeout { elapsed_ms } => LlmError::Timeout { elapsed_ms },
            Self::ResponseFormat { message, raw } => LlmError::ResponseFormat { message, raw },
        }
    }
}

/// A body and the decoder that will read it.
struct QueuedStream {
    chunks: Vec<Result<Bytes, MockError>>,
    decoder: Box<dyn StreamDecoder>,
}

type StreamSlot = Result<QueuedStream, MockError>;

/// A queue-based mock provider.
///
/// # Panics
///
/// [`generate`](Provider::generate) panics if the response queue is empty.
/// [`stream`](Provider::stream) panics if the stream queue is empty.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<Response, MockError>>>,
    streams: Mutex<VecDeque<StreamSlot>>,
    meta: ProviderMetadata,
    calls: Arc<Mutex<Vec<ChatParams>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("meta", &self.meta)
            .field("queued_responses", &lock(&self.responses).len())
            .field("queued_streams", &lock(&self.streams).len())
            .field("recorded_calls", &lock(&self.calls).len())
            .finish()
    }
}

impl MockProvider {
    /// Creates a mock with empty queues.
    pub fn new(meta: ProviderMetadata) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            meta,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Enqueues a response for the next `generate` call.
    pub fn queue_response(&self, response: Response) -> &Self {
        lock(&self.responses).push_back(Ok(response));
        self
    }

    /// Enqueues an error for the next `generate` call.
    pub fn queue_error(&self, error: MockError) -> &Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Enqueues a body for the next `stream` call, read with `decoder`.
    pub fn queue_stream(&self, chunks: Vec<Bytes>, decoder: Box<dyn StreamDecoder>) -> &Self {
        self.queue_stream_results(chunks.into_iter().map(Ok).collect(), decoder)
    }

    /// Enqueues a body whose items may fail mid-stream.
    pub fn queue_stream_results(
        &self,
        chunks: Vec<Result<Bytes, MockError>>,
        decoder: Box<dyn StreamDecoder>,
    ) -> &Self {
        lock(&self.streams).push_back(Ok(QueuedStream { chunks, decoder }));
        self
    }

    /// Enqueues an error returned by `stream()` itself, before any body
    /// is read (an error status, say).
    pub fn queue_stream_error(&self, error: MockError) -> &Self {
        lock(&self.streams).push_back(Err(error));
        self
    }

    /// Every `ChatParams` passed to `generate` or `stream`, in call order.
    pub fn recorded_calls(&self) -> Vec<ChatParams> {
        lock(&self.calls).clone()
    }

    fn record_call(&self, params: &ChatParams) {
        lock(&self.calls).push(params.clone());
    }
}

impl Provider for MockProvider {
    async fn generate(&self, params: &ChatParams) -> Result<Response, LlmError> {
        self.record_call(params);
        let result = lock(&self.responses)
            .pop_front()
            .expect("MockProvider: no queued responses remaining");
        result.map_err(MockError::into_llm_error)
    }

    async fn stream(&self, params: &ChatParams) -> Result<StreamingResponse, LlmError> {
        self.record_call(params);
        let queued = lock(&self.streams)
            .pop_front()
            .expect("MockProvider: no queued stream responses remaining");
        let QueuedStream { chunks, decoder } = queued.map_err(MockError::into_llm_error)?;

        let body: ByteStream = Box::pin(futures::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| chunk.map_err(MockError::into_llm_error)),
        ));
        Ok(StreamingResponse::with_json_backend(
            body,
            decoder,
            default_backend(),
        ))
    }

    fn metadata(&self) -> ProviderMetadata {
        self.meta.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use futures::StreamExt;

    use super::*;
    use crate::error::ApiErrorKind;
    use crate::provider::{Capability, DynProvider};
    use crate::test_helpers::{TextDecoder, done_frame, sample_response, sse_frame};

    fn test_metadata() -> ProviderMetadata {
        ProviderMetadata {
            name: "mock".into(),
            model: "test-model".into(),
            context_window: 128_000,
            capabilities: HashSet::from([Capability::Tools]),
        }
    }

    #[tokio::test]
    async fn test_mock_generate_returns_queued() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_response(sample_response("first"));
        mock.queue_response(sample_response("second"));

        let r1 = mock.generate(&ChatParams::default()).await.unwrap();
        let r2 = mock.generate(&ChatParams::default()).await.unwrap();
        assert_eq!(r1.text(), "first");
        assert_eq!(r2.text(), "second");
    }

    #[tokio::test]
    async fn test_mock_generate_error() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_error(MockError::Api {
            status: http::StatusCode::TOO_MANY_REQUESTS,
            code: None,
            message: "slow down".into(),
        });

        let err = mock.generate(&ChatParams::default()).await.unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimit));
    }

    #[tokio::test]
    #[should_panic(expected = "no queued responses")]
    async fn test_mock_generate_empty_queue_panics() {
        let mock = MockProvider::new(test_metadata());
        let _ = mock.generate(&ChatParams::default()).await;
    }

    #[tokio::test]
    async fn test_mock_stream_runs_pipeline() {
        let mock = MockProvider::new(test_metadata());
        let body = format!(
            "{}{}{}",
            sse_frame(&serde_json::json!({"text": "hello"})),
            sse_frame(&serde_json::json!({"text": " world"})),
            done_frame()
        );
        mock.queue_stream(vec![Bytes::from(body)], Box::new(TextDecoder));

        let stream = mock.stream(&ChatParams::default()).await.unwrap();
        let resp = stream.collect().await.unwrap();
        assert_eq!(resp.text(), "hello world");
        assert!(resp.is_complete());
    }

    #[tokio::test]
    async fn test_mock_stream_mid_failure() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_stream_results(
            vec![
                Ok(Bytes::from(sse_frame(&serde_json::json!({"text": "par"})))),
                Err(MockError::Http {
                    status: None,
                    message: "reset".into(),
                    retryable: true,
                }),
            ],
            Box::new(TextDecoder),
        );

        let mut stream = mock.stream(&ChatParams::default()).await.unwrap();
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        assert!(items[0].is_ok());
        assert!(items.last().unwrap().is_err());
        assert!(!stream.into_response().is_complete());
    }

    #[tokio::test]
    async fn test_mock_stream_error() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_stream_error(MockError::Auth("bad token".into()));

        let err = mock.stream(&ChatParams::default()).await.err().unwrap();
        assert!(matches!(err, LlmError::Auth(_)));
    }

    #[tokio::test]
    async fn test_mock_records_params() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_response(sample_response("ok"));

        let params = ChatParams {
            temperature: Some(0.5),
            system: Some("be brief".into()),
            ..Default::default()
        };
        let _ = mock.generate(&params).await;

        let recorded = mock.recorded_calls();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].temperature, Some(0.5));
    }

    #[tokio::test]
    async fn test_mock_as_dyn_provider() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_response(sample_response("boxed"));
        let provider: Box<dyn DynProvider> = Box::new(mock);

        let resp = provider
            .generate_boxed(&ChatParams::default())
            .await
            .unwrap();
        assert_eq!(resp.text(), "boxed");
        assert_eq!(provider.metadata().model, "test-model");
    }
}
