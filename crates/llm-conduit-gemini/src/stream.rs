//! `streamGenerateContent?alt=sse` decoder.
//!
//! Every `data:` payload is a full `GenerateContentResponse` holding only
//! the new text. There is no end sentinel; the server closes the stream.

use llm_conduit::sse::ParserConfig;
use llm_conduit::{ResponseAccumulator, StreamDecoder};
use serde_json::Value;

use crate::convert::apply_response;
use crate::types::GenerateResponse;

/// [`StreamDecoder`] for the Gemini dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiDecoder;

impl GeminiDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }
}

impl StreamDecoder for GeminiDecoder {
    fn dialect(&self) -> &'static str {
        "gemini"
    }

    fn parser_config(&self) -> ParserConfig {
        ParserConfig::sse().without_sentinel()
    }

    fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator) {
        match serde_json::from_value::<GenerateResponse>(chunk) {
            Ok(resp) => apply_response(resp, acc),
            Err(e) => tracing::debug!(error = %e, "Ignoring unrecognized Gemini chunk"),
        }
    }
}
