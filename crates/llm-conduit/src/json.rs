//! Pluggable JSON parsing for stream payloads.
//!
//! The backend is passed to each provider at construction rather than
//! chosen per process, so two clients in one program can use different
//! parsers without affecting each other.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use serde_json::error::Category;

/// Why a backend could not produce a value.
///
/// Only [`Syntax`](Self::Syntax) is recoverable inside a stream: the
/// dispatcher drops that frame and continues. Anything else points at
/// a bug or an environment problem and is surfaced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonError {
    /// The text is not well-formed JSON, including truncated input.
    #[error("JSON syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Backend description of the problem.
        message: String,
        /// One-based line of the error.
        line: usize,
        /// One-based column of the error.
        column: usize,
    },
    /// The backend failed for a reason other than malformed input.
    #[error("JSON backend error: {0}")]
    Backend(String),
}

impl JsonError {
    /// `true` for malformed or truncated input.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

impl From<serde_json::Error> for JsonError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Syntax | Category::Eof => Self::Syntax {
                message: err.to_string(),
                line: err.line(),
                column: err.column(),
            },
            Category::Data | Category::Io => Self::Backend(err.to_string()),
        }
    }
}

/// Parses one payload into a JSON value.
pub trait JsonBackend: fmt::Debug + Send + Sync {
    /// Parses `text` as a single JSON document.
    fn parse(&self, text: &str) -> Result<Value, JsonError>;
}

/// The default backend, built on `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJson;

impl JsonBackend for SerdeJson {
    fn parse(&self, text: &str) -> Result<Value, JsonError> {
        serde_json::from_str(text).map_err(JsonError::from)
    }
}

/// A shared handle to the default backend.
pub fn default_backend() -> Arc<dyn JsonBackend> {
    Arc::new(SerdeJson)
}
