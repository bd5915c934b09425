//! Chat Completions stream decoder.
//!
//! Each `data:` payload is a `chat.completion.chunk`:
//!
//! ```text
//! {"id":"..","model":"..","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}
//! {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"a\":"}}]}}]}
//! {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}
//! data: [DONE]
//! ```
//!
//! Tool calls arrive as fragments keyed by `index`: the first carries
//! `id` and `function.name`, later ones only argument text.

use llm_conduit::sse::ParserConfig;
use llm_conduit::{ResponseAccumulator, Role, StreamDecoder};
use serde_json::Value;

use crate::convert::{convert_stop_reason, convert_usage};
use crate::types::StreamChunk;

/// [`StreamDecoder`] for the Chat Completions dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiDecoder;

impl OpenAiDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }
}

impl StreamDecoder for OpenAiDecoder {
    fn dialect(&self) -> &'static str {
        "openai"
    }

    fn parser_config(&self) -> ParserConfig {
        ParserConfig::sse()
    }

    /// Every finished stream ends with `data: [DONE]`.
    fn requires_terminator(&self) -> bool {
        true
    }

    fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator) {
        let chunk: StreamChunk = match serde_json::from_value(chunk) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unrecognized OpenAI chunk");
                return;
            }
        };

        if let Some(error) = &chunk.error {
            tracing::warn!(
                code = ?error.code(),
                message = %error.message,
                "OpenAI reported an error mid-stream"
            );
            let reason = match error.code() {
                Some(code) => format!("{code}: {}", error.message),
                None => error.message.clone(),
            };
            acc.abort(reason);
            return;
        }
        if let Some(id) = &chunk.id {
            acc.set_id(id);
        }
        if let Some(model) = &chunk.model {
            acc.set_model(model);
        }

        for choice in chunk.choices {
            let index = choice.index;
            let delta = choice.delta;

            if let Some(role) = delta.role.as_deref().and_then(Role::parse) {
                acc.set_role(index, role);
            }
            if let Some(text) = &delta.content {
                acc.append_text(index, text);
            }
            if let Some(reasoning) = &delta.reasoning_content {
                acc.append_reasoning(index, reasoning);
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let function = call.function.unwrap_or_default();
                acc.tool_call_delta(
                    index,
                    call.index,
                    call.id.as_deref(),
                    function.name.as_deref(),
                    function.arguments.as_deref(),
                );
            }
            for annotation in delta.annotations.unwrap_or_default() {
                acc.add_annotation(index, annotation);
            }
            if let Some(reason) = &choice.finish_reason {
                acc.set_finish_reason(index, convert_stop_reason(reason));
            }
        }

        // Sent once, on the final chunk, when `include_usage` was requested.
        if let Some(usage) = chunk.usage {
            acc.set_usage(convert_usage(usage));
        }
    }
}
