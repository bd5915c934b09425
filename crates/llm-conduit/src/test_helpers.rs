//! Helpers for testing code built on `llm-conduit`.
//!
//! Available with the `test-utils` feature so provider crates and
//! downstream users can reuse them. Covers sample bodies and responses,
//! SSE frame builders, byte streams split at arbitrary boundaries or
//! failing partway, a minimal test dialect ([`TextDecoder`]), and a
//! quick [`MockProvider`] factory.

use std::collections::HashSet;

use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;

use crate::accumulator::{ResponseAccumulator, ResponseBody};
use crate::chat::{Message, Role, StopReason};
use crate::decoder::StreamDecoder;
use crate::error::LlmError;
use crate::mock::MockProvider;
use crate::provider::{Capability, ProviderMetadata};
use crate::response::Response;
use crate::stream::{ByteStream, StreamEvent, StreamingResponse};
use crate::usage::Usage;

/// A body with one assistant choice holding `text`.
pub fn sample_body(text: &str) -> ResponseBody {
    let mut body = ResponseBody {
        id: Some("resp_test".into()),
        model: Some("test-model".into()),
        usage: Some(sample_usage()),
        ..ResponseBody::default()
    };
    let choice = body.choice_mut(0);
    choice.role = Some(Role::Assistant);
    choice.content = text.into();
    choice.finish_reason = Some(StopReason::EndTurn);
    body
}

/// A complete [`Response`] wrapping [`sample_body`].
pub fn sample_response(text: &str) -> Response {
    Response::from_body(sample_body(text))
}

/// 100 input / 50 output tokens.
pub fn sample_usage() -> Usage {
    Usage::new(100, 50)
}

/// Shorthand for [`Message::user`].
pub fn user_msg(text: &str) -> Message {
    Message::user(text)
}

/// Shorthand for [`Message::system`].
pub fn system_msg(text: &str) -> Message {
    Message::system(text)
}

/// Shorthand for [`Message::tool_result`].
pub fn tool_result_msg(tool_call_id: &str, content: &str) -> Message {
    Message::tool_result(tool_call_id, content)
}

/// `data: <json>\n\n`
pub fn sse_frame(payload: &Value) -> String {
    format!("data: {payload}\n\n")
}

/// `event: <name>\ndata: <json>\n\n`
pub fn sse_named_frame(event: &str, payload: &Value) -> String {
    format!("event: {event}\ndata: {payload}\n\n")
}

/// `data: [DONE]\n\n`
pub fn done_frame() -> &'static str {
    "data: [DONE]\n\n"
}

/// Splits `text` into byte chunks of `size`, ignoring UTF-8 boundaries.
pub fn split_bytes(text: &str, size: usize) -> Vec<Bytes> {
    text.as_bytes()
        .chunks(size.max(1))
        .map(Bytes::copy_from_slice)
        .collect()
}

/// A body that yields `text` in chunks of `size` bytes.
pub fn chunked_body(text: &str, size: usize) -> ByteStream {
    Box::pin(futures::stream::iter(split_bytes(text, size).into_iter().map(Ok)))
}

/// A body that yields `chunks` and then fails with a transport error.
pub fn failing_body(chunks: Vec<Bytes>, message: &str) -> ByteStream {
    let error = LlmError::transport(message);
    Box::pin(futures::stream::iter(
        chunks
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(error))),
    ))
}

/// Drains a stream, panicking on any error.
pub async fn collect_events(stream: StreamingResponse) -> Vec<StreamEvent> {
    stream
        .map(|r| r.expect("stream event should be Ok"))
        .collect::<Vec<_>>()
        .await
}

/// A [`MockProvider`] with the given name and model.
pub fn mock_for(provider_name: &str, model: &str) -> MockProvider {
    MockProvider::new(ProviderMetadata {
        name: provider_name.to_owned().into(),
        model: model.into(),
        context_window: 128_000,
        capabilities: HashSet::from([Capability::Tools]),
    })
}

/// A minimal dialect for exercising the pipeline without a real provider.
///
/// Chunks look like
/// `{"index": 0, "text": "..", "tool": {"index": 0, "id": "..", "name": "..", "args": ".."}, "usage": [10, 5], "stop": true}`,
/// every field optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl StreamDecoder for TextDecoder {
    fn dialect(&self) -> &'static str {
        "test"
    }

    fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator) {
        let index = chunk
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|i| u32::try_from(i).ok())
            .unwrap_or(0);

        if let Some(text) = chunk.get("text").and_then(Value::as_str) {
            acc.append_text(index, text);
        }
        if let Some(tool) = chunk.get("tool") {
            let call_index = tool
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|i| u32::try_from(i).ok())
                .unwrap_or(0);
            acc.tool_call_delta(
                index,
                call_index,
                tool.get("id").and_then(Value::as_str),
                tool.get("name").and_then(Value::as_str),
                tool.get("args").and_then(Value::as_str),
            );
        }
        if let Some([input, output]) = chunk
            .get("usage")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
        {
            acc.set_usage(Usage::new(
                input.as_u64().unwrap_or(0),
                output.as_u64().unwrap_or(0),
            ));
        }
        if chunk.get("stop").and_then(Value::as_bool) == Some(true) {
            acc.set_finish_reason(index, StopReason::EndTurn);
        }
    }
}
