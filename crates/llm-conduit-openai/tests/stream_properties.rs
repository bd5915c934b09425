//! Recorded Chat Completions streams replayed through the full pipeline.

use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;

use llm_conduit::json::default_backend;
use llm_conduit::mock::MockProvider;
use llm_conduit::test_helpers::{
    chunked_body, done_frame, failing_body, mock_for, sse_frame, user_msg,
};
use llm_conduit::{
    ChatParams, Provider, Role, StopReason, StreamEvent, StreamOutcome, StreamingResponse,
    ToolArguments,
};
use llm_conduit_openai::OpenAiDecoder;

fn stream(body: &str, chunk_size: usize) -> StreamingResponse {
    StreamingResponse::new(chunked_body(body, chunk_size), Box::new(OpenAiDecoder::new()))
}

#[tokio::test]
async fn hello_example() {
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    for size in [1, 3, 16, body.len()] {
        let response = stream(body, size).collect().await.unwrap();
        assert_eq!(response.choices()[0].text(), Some("Hello"));
        assert_eq!(response.choices()[0].role, Role::Assistant);
        assert!(response.is_complete());
    }
}

#[tokio::test]
async fn recorded_tool_call_stream() {
    let body = [
        sse_frame(&json!({"id": "chatcmpl-9", "model": "gpt-4o-mini", "choices": [{"index": 0, "delta": {"role": "assistant", "content": null, "tool_calls": [{"index": 0, "id": "call_w", "type": "function", "function": {"name": "get_weather", "arguments": ""}}]}, "finish_reason": null}]})),
        sse_frame(&json!({"id": "chatcmpl-9", "model": "gpt-4o-mini", "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"ci"}}]}}]})),
        sse_frame(&json!({"id": "chatcmpl-9", "model": "gpt-4o-mini", "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "ty\":\"Paris\"}"}}]}}]})),
        sse_frame(&json!({"id": "chatcmpl-9", "model": "gpt-4o-mini", "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]})),
        sse_frame(&json!({"id": "chatcmpl-9", "model": "gpt-4o-mini", "choices": [], "usage": {"prompt_tokens": 60, "completion_tokens": 15, "total_tokens": 75}})),
        done_frame().to_owned(),
    ]
    .concat();

    let response = stream(&body, 11).collect().await.unwrap();
    assert_eq!(response.id(), Some("chatcmpl-9"));
    assert_eq!(response.model(), Some("gpt-4o-mini"));
    assert_eq!(response.stop_reason(), Some(StopReason::ToolUse));
    assert_eq!(response.usage().total_tokens, 75);

    let call = &response.tool_calls()[0];
    assert_eq!(call.id, "call_w");
    assert_eq!(call.name, "get_weather");
    assert_eq!(call.arguments, ToolArguments::Parsed(json!({"city": "Paris"})));
}

#[tokio::test]
async fn keepalive_comments_and_garbage_are_skipped() {
    let body = format!(
        ": OPENROUTER PROCESSING\n\n{}data: {{\"choices\":[{{\n\n{}{}",
        sse_frame(&json!({"choices": [{"index": 0, "delta": {"content": "a"}}]})),
        sse_frame(&json!({"choices": [{"index": 0, "delta": {"content": "b"}}]})),
        done_frame()
    );
    let stream = stream(&body, 4);
    let response = stream.collect().await.unwrap();
    assert_eq!(response.text(), "ab");
}

#[tokio::test]
async fn malformed_usage_keeps_choices() {
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}],\"usage\":\"n/a\"}\n\n",
        "data: [DONE]\n\n",
    );
    let response = stream(body, 7).collect().await.unwrap();
    assert_eq!(response.text(), "Hello");
    assert_eq!(response.usage().total_tokens, 0);
    assert!(response.is_complete());
}

#[tokio::test]
async fn in_band_error_aborts() {
    let body = format!(
        "{}{}",
        sse_frame(&json!({"choices": [{"index": 0, "delta": {"content": "par"}}]})),
        sse_frame(&json!({"error": {"message": "upstream overloaded", "code": "server_error"}})),
    );
    let response = stream(&body, 9).collect().await.unwrap();
    assert_eq!(response.text(), "par");
    assert_eq!(
        response.outcome(),
        &StreamOutcome::Aborted {
            reason: "server_error: upstream overloaded".into()
        }
    );
}

#[tokio::test]
async fn clean_close_before_done_is_unterminated() {
    let body: String = ["The", " answer", " is"]
        .iter()
        .map(|t| sse_frame(&json!({"choices": [{"index": 0, "delta": {"content": t}}]})))
        .collect();
    let response = stream(&body, 6).collect().await.unwrap();
    assert_eq!(response.text(), "The answer is");
    assert_eq!(response.stop_reason(), None);
    assert_eq!(response.outcome(), &StreamOutcome::Unterminated);
    assert!(!response.is_complete());
}

#[tokio::test]
async fn connection_drop_keeps_partial_text() {
    let frames = ["The", " answer", " is"]
        .iter()
        .map(|t| Bytes::from(sse_frame(&json!({"choices": [{"index": 0, "delta": {"content": t}}]}))))
        .collect();
    let mut stream = StreamingResponse::with_json_backend(
        failing_body(frames, "connection reset"),
        Box::new(OpenAiDecoder::new()),
        default_backend(),
    );

    let mut saw_error = false;
    while let Some(item) = stream.next().await {
        saw_error |= item.is_err();
    }
    assert!(saw_error);

    let response = stream.into_response();
    assert_eq!(response.text(), "The answer is");
    assert!(matches!(response.outcome(), StreamOutcome::Aborted { .. }));
}

#[tokio::test]
async fn mock_provider_drives_openai_decoder() {
    let mock: MockProvider = mock_for("openai", "gpt-4o-mini");
    let body = format!(
        "{}{}",
        sse_frame(&json!({"choices": [{"index": 0, "delta": {"content": "pong"}, "finish_reason": "stop"}]})),
        done_frame()
    );
    mock.queue_stream(vec![Bytes::from(body)], Box::new(OpenAiDecoder::new()));

    let params = ChatParams {
        messages: vec![user_msg("ping")],
        ..Default::default()
    };
    let events: Vec<_> = mock
        .stream(&params)
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta {
                index: 0,
                text: "pong".into()
            },
            StreamEvent::Finish {
                index: 0,
                reason: StopReason::EndTurn
            },
        ]
    );
}
