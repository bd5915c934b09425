//! `/api/chat` NDJSON decoder.
//!
//! Each line is a JSON object carrying the next piece of the message.
//! The final line has `done: true` together with the finish reason and
//! token counts; a line with only `error` ends the stream abnormally.

use llm_conduit::sse::ParserConfig;
use llm_conduit::{ResponseAccumulator, StreamDecoder};
use serde_json::Value;

use crate::convert::apply_chunk;
use crate::types::ChatChunk;

/// [`StreamDecoder`] for the Ollama dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaDecoder;

impl OllamaDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }
}

impl StreamDecoder for OllamaDecoder {
    fn dialect(&self) -> &'static str {
        "ollama"
    }

    fn parser_config(&self) -> ParserConfig {
        ParserConfig::lines()
    }

    /// The last line of a finished stream has `done: true`.
    fn requires_terminator(&self) -> bool {
        true
    }

    fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator) {
        let chunk = match serde_json::from_value::<ChatChunk>(chunk) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unrecognized Ollama line");
                return;
            }
        };
        let done = chunk.done;
        apply_chunk(chunk, acc);
        if done {
            acc.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use llm_conduit::accumulator::StreamState;
    use llm_conduit::{Role, StopReason, StreamEvent, Usage};
    use serde_json::json;

    use super::*;

    fn decode_all(chunks: &[Value]) -> ResponseAccumulator {
        let mut decoder = OllamaDecoder::new();
        let mut acc = ResponseAccumulator::new();
        for chunk in chunks {
            decoder.decode(chunk.clone(), &mut acc);
        }
        acc
    }

    fn line(content: &str) -> Value {
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": content}, "done": false})
    }

    #[test]
    fn test_text_then_done() {
        let mut acc = decode_all(&[
            line("Hel"),
            line("lo"),
            json!({"model": "llama3.2", "message": {"role": "assistant", "content": ""},
                   "done": true, "done_reason": "stop", "prompt_eval_count": 8, "eval_count": 2}),
        ]);

        assert_eq!(acc.state(), StreamState::Completed);
        let body = acc.snapshot();
        assert_eq!(body.model.as_deref(), Some("llama3.2"));
        assert_eq!(body.choices[&0].content, "Hello");
        assert_eq!(body.choices[&0].role, Some(Role::Assistant));
        assert_eq!(body.choices[&0].finish_reason, Some(StopReason::EndTurn));
        assert_eq!(acc.usage(), Some(&Usage::new(8, 2)));

        let texts: Vec<_> = acc
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(texts, ["Hel", "lo"]);
    }

    #[test]
    fn test_lines_after_done_ignored() {
        let acc = decode_all(&[
            line("a"),
            json!({"done": true, "done_reason": "length"}),
            line("b"),
        ]);
        assert_eq!(acc.body().choices[&0].content, "a");
        assert_eq!(
            acc.body().choices[&0].finish_reason,
            Some(StopReason::MaxTokens)
        );
    }

    #[test]
    fn test_tool_calls_across_lines() {
        let acc = decode_all(&[
            json!({"message": {"role": "assistant", "content": "", "tool_calls": [
                {"function": {"name": "get_weather", "arguments": {"city": "Oslo"}}}
            ]}, "done": false}),
            json!({"message": {"role": "assistant", "content": "", "tool_calls": [
                {"function": {"name": "get_time", "arguments": {}}}
            ]}, "done": false}),
            json!({"done": true, "done_reason": "stop"}),
        ]);

        let slot = &acc.body().choices[&0];
        assert_eq!(slot.tool_calls[&0].id.as_deref(), Some("call_get_weather_0"));
        assert_eq!(slot.tool_calls[&0].arguments, r#"{"city":"Oslo"}"#);
        assert_eq!(slot.tool_calls[&1].id.as_deref(), Some("call_get_time_1"));
        assert_eq!(slot.finish_reason, Some(StopReason::ToolUse));
    }

    #[test]
    fn test_thinking_goes_to_reasoning() {
        let acc = decode_all(&[json!({
            "message": {"role": "assistant", "content": "", "thinking": "hmm"},
            "done": false
        })]);
        assert_eq!(acc.body().choices[&0].reasoning, "hmm");
    }

    #[test]
    fn test_error_line_aborts() {
        let acc = decode_all(&[line("par"), json!({"error": "model crashed"})]);
        assert_eq!(acc.state(), StreamState::Aborted);
        assert_eq!(acc.abort_reason(), Some("model crashed"));
        assert_eq!(acc.body().choices[&0].content, "par");
    }

    #[test]
    fn test_unrecognized_lines_ignored() {
        let acc = decode_all(&[json!("hello"), json!({"message": 42})]);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_malformed_counts_keep_text() {
        let acc = decode_all(&[
            line("ok"),
            json!({"message": {"role": "assistant", "content": ""}, "done": true,
                   "done_reason": "stop", "prompt_eval_count": "n/a", "eval_count": 4}),
        ]);
        assert_eq!(acc.state(), StreamState::Completed);
        assert_eq!(acc.body().choices[&0].content, "ok");
        assert_eq!(
            acc.body().choices[&0].finish_reason,
            Some(StopReason::EndTurn)
        );
        assert_eq!(acc.usage(), Some(&Usage::new(0, 4)));
    }
}
