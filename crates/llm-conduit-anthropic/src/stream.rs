//! Messages API stream decoder.
//!
//! Anthropic sends named SSE events whose JSON repeats the name in `type`:
//!
//! ```text
//! event: message_start        {"message":{"id":"msg_..","model":"..","usage":{"input_tokens":25}}}
//! event: content_block_start  {"index":1,"content_block":{"type":"tool_use","id":"toolu_..","name":".."}}
//! event: content_block_delta  {"index":0,"delta":{"type":"text_delta","text":"Hel"}}
//! event: message_delta        {"delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":15}}
//! event: message_stop         {}
//! ```
//!
//! Content blocks are indexed across text and tool use, so a tool block
//! at `index: 1` is the first tool call. The decoder keeps that mapping.

use std::collections::HashMap;

use llm_conduit::sse::ParserConfig;
use llm_conduit::{ResponseAccumulator, Role, StreamDecoder};
use serde_json::Value;

use crate::convert::{convert_stop_reason, merge_usage};
use crate::types::{ResponseContent, StreamDelta, StreamEvent};

/// Anthropic has a single choice.
const CHOICE: u32 = 0;

/// [`StreamDecoder`] for the Messages API dialect.
#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    /// Content block index to tool call index.
    tool_blocks: HashMap<u32, u32>,
}

impl AnthropicDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self::default()
    }

    fn call_index(&mut self, block: u32, acc: &ResponseAccumulator) -> u32 {
        let next = u32::try_from(acc.tool_call_count(CHOICE)).unwrap_or(u32::MAX);
        *self.tool_blocks.entry(block).or_insert(next)
    }

    fn block_start(&mut self, block_index: u32, block: ResponseContent, acc: &mut ResponseAccumulator) {
        match block.content_type.as_str() {
            "text" => {
                if let Some(text) = &block.text {
                    acc.append_text(CHOICE, text);
                }
            }
            "thinking" => {
                if let Some(thinking) = &block.thinking {
                    acc.append_reasoning(CHOICE, thinking);
                }
            }
            "tool_use" => {
                let call = self.call_index(block_index, acc);
                // `input` is always `{}` here; the real arguments follow
                // as `input_json_delta` fragments.
                acc.tool_call_delta(CHOICE, call, block.id.as_deref(), block.name.as_deref(), None);
            }
            other => tracing::debug!(block_type = other, "Ignoring Anthropic content block"),
        }
    }

    fn block_delta(&mut self, block_index: u32, delta: StreamDelta, acc: &mut ResponseAccumulator) {
        match delta.delta_type.as_deref().unwrap_or_default() {
            "text_delta" => acc.append_text(CHOICE, delta.text.as_deref().unwrap_or_default()),
            "thinking_delta" => {
                acc.append_reasoning(CHOICE, delta.thinking.as_deref().unwrap_or_default());
            }
            "input_json_delta" => {
                let call = self.call_index(block_index, acc);
                acc.tool_call_delta(CHOICE, call, None, None, delta.partial_json.as_deref());
            }
            "citations_delta" => {
                if let Some(citation) = delta.citation {
                    acc.add_annotation(CHOICE, citation);
                }
            }
            "signature_delta" => {}
            other => tracing::debug!(delta_type = other, "Ignoring Anthropic delta"),
        }
    }
}

impl StreamDecoder for AnthropicDecoder {
    fn dialect(&self) -> &'static str {
        "anthropic"
    }

    /// `message_stop` ends the stream; there is no `[DONE]` payload.
    fn parser_config(&self) -> ParserConfig {
        ParserConfig::sse().without_sentinel()
    }

    fn requires_terminator(&self) -> bool {
        true
    }

    fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator) {
        let event: StreamEvent = match serde_json::from_value(chunk) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unrecognized Anthropic event");
                return;
            }
        };
        let block_index = event.index.unwrap_or_default();

        match event.event_type.as_str() {
            "message_start" => {
                let Some(message) = event.message else {
                    return;
                };
                if let Some(id) = &message.id {
                    acc.set_id(id);
                }
                if let Some(model) = &message.model {
                    acc.set_model(model);
                }
                let role = message
                    .role
                    .as_deref()
                    .and_then(Role::parse)
                    .unwrap_or(Role::Assistant);
                acc.set_role(CHOICE, role);
                if let Some(usage) = &message.usage {
                    acc.set_usage(merge_usage(acc.usage(), usage));
                }
            }
            "content_block_start" => {
                if let Some(block) = event.content_block {
                    self.block_start(block_index, block, acc);
                }
            }
            "content_block_delta" => {
                if let Some(delta) = event.delta {
                    self.block_delta(block_index, delta, acc);
                }
            }
            "message_delta" => {
                if let Some(reason) = event.delta.and_then(|d| d.stop_reason) {
                    acc.set_finish_reason(CHOICE, convert_stop_reason(&reason));
                }
                if let Some(usage) = &event.usage {
                    acc.set_usage(merge_usage(acc.usage(), usage));
                }
            }
            "message_stop" => {
                acc.complete();
            }
            "error" => {
                let error = event.error.unwrap_or_default();
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    "Anthropic reported an error mid-stream"
                );
                let reason = match error.error_type {
                    Some(kind) => format!("{kind}: {}", error.message),
                    None => error.message,
                };
                acc.abort(reason);
            }
            "ping" | "content_block_stop" => {}
            other => tracing::debug!(event_type = other, "Ignoring Anthropic event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use llm_conduit::accumulator::StreamState;
    use llm_conduit::{StopReason, StreamEvent as Event, Usage};
    use serde_json::json;

    use super::*;

    fn decode_all(events: &[Value]) -> ResponseAccumulator {
        let mut decoder = AnthropicDecoder::new();
        let mut acc = ResponseAccumulator::new();
        for event in events {
            decoder.decode(event.clone(), &mut acc);
        }
        acc
    }

    fn message_start() -> Value {
        json!({"type": "message_start", "message": {
            "id": "msg_01", "type": "message", "role": "assistant",
            "model": "claude-sonnet-4-20250514", "content": [],
            "usage": {"input_tokens": 25, "output_tokens": 1}
        }})
    }

    #[test]
    fn test_text_stream() {
        let mut acc = decode_all(&[
            message_start(),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hel"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "lo"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 15}}),
            json!({"type": "message_stop"}),
        ]);

        assert_eq!(acc.state(), StreamState::Completed);
        assert_eq!(acc.usage(), Some(&Usage::new(25, 15)));

        let body = acc.snapshot();
        assert_eq!(body.id.as_deref(), Some("msg_01"));
        assert_eq!(body.model.as_deref(), Some("claude-sonnet-4-20250514"));
        assert_eq!(body.choices[&0].content, "Hello");
        assert_eq!(body.choices[&0].role, Some(Role::Assistant));
        assert_eq!(body.choices[&0].finish_reason, Some(StopReason::EndTurn));

        let events = acc.drain_events();
        assert_eq!(
            events.last(),
            Some(&Event::Finish {
                index: 0,
                reason: StopReason::EndTurn
            })
        );
    }

    #[test]
    fn test_tool_use_after_text_gets_call_index_zero() {
        let acc = decode_all(&[
            message_start(),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking."}}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {}}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": ""}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"city\": "}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"Paris\"}"}}),
            json!({"type": "content_block_start", "index": 2, "content_block": {"type": "tool_use", "id": "toolu_2", "name": "get_time", "input": {}}}),
            json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "{}"}}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 40}}),
        ]);

        let body = acc.snapshot();
        let calls = &body.choices[&0].tool_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[&0].id.as_deref(), Some("toolu_1"));
        assert_eq!(calls[&0].name.as_deref(), Some("get_weather"));
        assert_eq!(calls[&0].arguments, "{\"city\": \"Paris\"}");
        assert_eq!(calls[&1].id.as_deref(), Some("toolu_2"));
        assert_eq!(calls[&1].arguments, "{}");
        assert_eq!(body.choices[&0].finish_reason, Some(StopReason::ToolUse));
        // No message_stop yet.
        assert_eq!(acc.state(), StreamState::Receiving);
    }

    #[test]
    fn test_thinking_and_citations() {
        let acc = decode_all(&[
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "Consider"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "abc"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "citations_delta", "citation": {"type": "char_location", "cited_text": "x"}}}),
        ]);

        let body = acc.snapshot();
        assert_eq!(body.choices[&0].reasoning, "Consider");
        assert_eq!(body.choices[&0].annotations.len(), 1);
        assert_eq!(body.choices[&0].annotations[0]["cited_text"], "x");
    }

    #[test]
    fn test_error_event_aborts() {
        let acc = decode_all(&[
            message_start(),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "partial"}}),
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " ignored"}}),
        ]);

        assert_eq!(acc.state(), StreamState::Aborted);
        assert_eq!(acc.abort_reason(), Some("overloaded_error: Overloaded"));
        assert_eq!(acc.body().choices[&0].content, "partial");
    }

    #[test]
    fn test_cache_usage_merged() {
        let acc = decode_all(&[
            json!({"type": "message_start", "message": {"id": "m", "usage": {
                "input_tokens": 10, "cache_creation_input_tokens": 100, "cache_read_input_tokens": 50, "output_tokens": 1
            }}}),
            json!({"type": "message_delta", "delta": {}, "usage": {"output_tokens": 7}}),
        ]);

        let usage = acc.usage().unwrap();
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.total_tokens, 17);
        assert_eq!(usage.cache_write_tokens, Some(100));
        assert_eq!(usage.cache_read_tokens, Some(50));
    }

    #[test]
    fn test_unknown_shapes_ignored() {
        let acc = decode_all(&[
            json!({"type": "future_event", "payload": 1}),
            json!("not an object"),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "new_delta"}}),
        ]);
        assert!(acc.is_empty());
        assert_eq!(acc.state(), StreamState::Receiving);
    }

    #[test]
    fn test_malformed_usage_keeps_stop_reason() {
        let acc = decode_all(&[
            message_start(),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "ok"}}),
            json!({"type": "message_delta", "delta": {"stop_reason": "max_tokens"}, "usage": "n/a"}),
        ]);
        let slot = &acc.body().choices[&0];
        assert_eq!(slot.content, "ok");
        assert_eq!(slot.finish_reason, Some(StopReason::MaxTokens));
        assert_eq!(acc.usage(), Some(&Usage::new(25, 1)));
    }
}
