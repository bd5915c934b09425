//! Unified error type for all LLM operations.
//!
//! Every provider maps its native failures into [`LlmError`], giving
//! callers a single type to match against regardless of which backend
//! is in use.
//!
//! # Error taxonomy
//!
//! | Situation | Variant |
//! |-----------|---------|
//! | Connection drop, DNS failure, mid-stream read error | [`LlmError::Http`] |
//! | Non-2xx status on the initiating response | [`LlmError::Api`] |
//! | Request timed out | [`LlmError::Timeout`] |
//! | Non-streaming body could not be parsed | [`LlmError::ResponseFormat`] |
//! | Local validation (bad header value, missing model) | [`LlmError::Auth`], [`LlmError::InvalidRequest`] |
//!
//! Malformed JSON inside a stream is *not* an error: the dispatcher
//! skips the frame and keeps going.
//!
//! ```rust
//! use llm_conduit::LlmError;
//! use llm_conduit::error::ApiErrorKind;
//!
//! fn should_back_off(err: &LlmError) -> bool {
//!     err.api_kind() == Some(ApiErrorKind::RateLimit)
//! }
//! ```

use std::fmt;

use http::StatusCode;

/// Classification of an HTTP error status returned by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ApiErrorKind {
    /// The credentials were missing, invalid, or lack permission.
    Authentication,
    /// The caller exceeded a rate or quota limit.
    RateLimit,
    /// The request was malformed or referenced something that does not exist.
    InvalidRequest,
    /// The prompt plus requested output does not fit the model's context.
    ContextWindowExceeded,
    /// The provider failed or is overloaded.
    Server,
    /// Anything else.
    Other,
}

/// Provider error codes that always mean the context window overflowed.
const CONTEXT_CODES: &[&str] = &["context_length_exceeded", "string_above_max_length"];

/// Lowercased message fragments that indicate a context window overflow.
const CONTEXT_HINTS: &[&str] = &[
    "context length",
    "context window",
    "maximum context",
    "prompt is too long",
    "too many tokens",
    "exceeds the maximum number of tokens",
    "input is too long",
];

impl ApiErrorKind {
    /// Classifies an error from its status, the provider's error code (if
    /// the body carried one), and the human-readable message.
    ///
    /// The status decides the broad class. The code and message can
    /// refine a 4xx into [`ContextWindowExceeded`](Self::ContextWindowExceeded),
    /// or a provider-specific code into a rate limit or auth failure.
    pub fn classify(status: StatusCode, code: Option<&str>, message: &str) -> Self {
        let code = code.map(str::to_ascii_lowercase);
        let code = code.as_deref();

        if code.is_some_and(|c| CONTEXT_CODES.contains(&c)) {
            return Self::ContextWindowExceeded;
        }
        match code {
            Some("rate_limit_exceeded" | "rate_limit_error" | "resource_exhausted") => {
                return Self::RateLimit;
            }
            Some(
                "invalid_api_key" | "authentication_error" | "permission_error" | "unauthenticated"
                | "permission_denied",
            ) => return Self::Authentication,
            Some("overloaded_error" | "api_error" | "internal" | "unavailable") => {
                return Self::Server;
            }
            _ => {}
        }

        match status.as_u16() {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            400 | 404 | 409 | 413 | 422 => {
                let lower = message.to_ascii_lowercase();
                if CONTEXT_HINTS.iter().any(|hint| lower.contains(hint)) {
                    Self::ContextWindowExceeded
                } else {
                    Self::InvalidRequest
                }
            }
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Whether a request failing with this kind may succeed on retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Server)
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::RateLimit => "rate limit",
            Self::InvalidRequest => "invalid request",
            Self::ContextWindowExceeded => "context window exceeded",
            Self::Server => "server",
            Self::Other => "api",
        };
        f.write_str(name)
    }
}

/// An HTTP error status from a provider, with the original body kept
/// for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// How the error was classified.
    pub kind: ApiErrorKind,
    /// The HTTP status of the initiating response.
    pub status: StatusCode,
    /// Provider-defined error code or type, if the body carried one.
    pub code: Option<String>,
    /// Human-readable message, extracted from the body when possible.
    pub message: String,
    /// The raw response body as received.
    pub body: String,
}

impl ApiError {
    /// Builds a classified error from the pieces a provider extracted
    /// from its error body.
    pub fn new(
        status: StatusCode,
        code: Option<String>,
        message: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let kind = ApiErrorKind::classify(status, code.as_deref(), &message);
        Self {
            kind,
            status,
            code,
            message,
            body: body.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error ({})", self.kind, self.status)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// The unified error type returned by all provider operations.
///
/// Variants are `#[non_exhaustive]`: new error kinds may be added in
/// minor releases, so always include a wildcard arm.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// A transport-level failure: connection refused or reset, a body
    /// read error mid-stream.
    ///
    /// `status` is `None` when no response was received.
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// The HTTP status code, if one was received.
        status: Option<StatusCode>,
        /// A human-readable description of the failure.
        message: String,
        /// Whether the caller should retry this request.
        retryable: bool,
    },

    /// The provider answered with an error status before streaming began.
    #[error("{0}")]
    Api(ApiError),

    /// Credentials could not be used locally (e.g. invalid header characters).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The request could not be built (missing fields, invalid parameters).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A response body could not be parsed.
    #[error("Response format error: {message}")]
    ResponseFormat {
        /// What went wrong during parsing.
        message: String,
        /// The raw payload, for diagnostics.
        raw: String,
    },

    /// The operation exceeded its deadline.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the timeout fired.
        elapsed_ms: u64,
    },
}

impl LlmError {
    /// Returns `true` if the error is transient and the request may succeed on retry.
    ///
    /// ```rust
    /// use llm_conduit::LlmError;
    ///
    /// let err = LlmError::Timeout { elapsed_ms: 5000 };
    /// assert!(err.is_retryable());
    ///
    /// let err = LlmError::Auth("bad key".into());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { retryable, .. } => *retryable,
            Self::Api(api) => api.kind.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// The classification of an [`Api`](Self::Api) error, if this is one.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api(api) => Some(api.kind),
            _ => None,
        }
    }

    /// Builds a transport error from anything displayable.
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::Http {
            status: None,
            message: format!("Stream read error: {err}"),
            retryable: true,
        }
    }
}

impl From<ApiError> for LlmError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth() {
        assert_eq!(
            ApiErrorKind::classify(StatusCode::UNAUTHORIZED, None, "bad key"),
            ApiErrorKind::Authentication
        );
        assert_eq!(
            ApiErrorKind::classify(StatusCode::FORBIDDEN, None, "nope"),
            ApiErrorKind::Authentication
        );
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(
            ApiErrorKind::classify(StatusCode::TOO_MANY_REQUESTS, None, "slow down"),
            ApiErrorKind::RateLimit
        );
    }

    #[test]
    fn test_classify_context_window_by_code() {
        assert_eq!(
            ApiErrorKind::classify(
                StatusCode::BAD_REQUEST,
                Some("context_length_exceeded"),
                "This model's maximum context length is 8192 tokens"
            ),
            ApiErrorKind::ContextWindowExceeded
        );
    }

    #[test]
    fn test_classify_context_window_by_message() {
        assert_eq!(
            ApiErrorKind::classify(
                StatusCode::BAD_REQUEST,
                Some("invalid_request_error"),
                "prompt is too long: 210000 tokens > 200000 maximum"
            ),
            ApiErrorKind::ContextWindowExceeded
        );
    }

    #[test]
    fn test_classify_invalid_request() {
        assert_eq!(
            ApiErrorKind::classify(StatusCode::BAD_REQUEST, None, "missing messages"),
            ApiErrorKind::InvalidRequest
        );
        assert_eq!(
            ApiErrorKind::classify(StatusCode::NOT_FOUND, None, "model not found"),
            ApiErrorKind::InvalidRequest
        );
    }

    #[test]
    fn test_classify_server() {
        assert_eq!(
            ApiErrorKind::classify(StatusCode::INTERNAL_SERVER_ERROR, None, "oops"),
            ApiErrorKind::Server
        );
        let overloaded = StatusCode::from_u16(529).unwrap();
        assert_eq!(
            ApiErrorKind::classify(overloaded, Some("overloaded_error"), "Overloaded"),
            ApiErrorKind::Server
        );
    }

    #[test]
    fn test_classify_code_overrides_status() {
        assert_eq!(
            ApiErrorKind::classify(StatusCode::BAD_REQUEST, Some("RESOURCE_EXHAUSTED"), "quota"),
            ApiErrorKind::RateLimit
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(
            ApiErrorKind::classify(StatusCode::IM_A_TEAPOT, None, "teapot"),
            ApiErrorKind::Other
        );
    }

    #[test]
    fn test_api_error_keeps_body() {
        let body = r#"{"error":{"message":"Invalid API key"}}"#;
        let err = ApiError::new(StatusCode::UNAUTHORIZED, None, "Invalid API key", body);
        assert_eq!(err.kind, ApiErrorKind::Authentication);
        assert_eq!(err.body, body);

        let display = err.to_string();
        assert!(display.contains("authentication"));
        assert!(display.contains("401"));
        assert!(display.contains("Invalid API key"));
    }

    #[test]
    fn test_error_display_http() {
        let err = LlmError::Http {
            status: Some(StatusCode::BAD_GATEWAY),
            message: "upstream closed".into(),
            retryable: true,
        };
        let display = format!("{err}");
        assert!(display.contains("502"));
        assert!(display.contains("upstream closed"));
    }

    #[test]
    fn test_retryable() {
        let rate = LlmError::from(ApiError::new(StatusCode::TOO_MANY_REQUESTS, None, "", ""));
        assert!(rate.is_retryable());

        let auth = LlmError::from(ApiError::new(StatusCode::UNAUTHORIZED, None, "", ""));
        assert!(!auth.is_retryable());

        assert!(LlmError::transport("connection reset").is_retryable());
        assert!(!LlmError::InvalidRequest("x".into()).is_retryable());
    }

    #[test]
    fn test_api_kind_accessor() {
        let err = LlmError::from(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, None, "", ""));
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Server));
        assert_eq!(LlmError::Timeout { elapsed_ms: 1 }.api_kind(), None);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmError>();
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
        let llm_err: LlmError = json_err.into();
        assert!(matches!(llm_err, LlmError::ResponseFormat { .. }));
    }
}
