//! Recorded `/api/chat` NDJSON streams replayed through the full pipeline.

use bytes::Bytes;
use futures::StreamExt;
use serde_json::{Value, json};

use llm_conduit::test_helpers::{chunked_body, failing_body, mock_for, user_msg};
use llm_conduit::{
    ChatParams, Provider, StopReason, StreamEvent, StreamOutcome, StreamingResponse, ToolArguments,
};
use llm_conduit_ollama::OllamaDecoder;

fn body(lines: &[Value]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

fn stream(body: &str, chunk_size: usize) -> StreamingResponse {
    StreamingResponse::new(chunked_body(body, chunk_size), Box::new(OllamaDecoder::new()))
}

fn text(content: &str) -> Value {
    json!({"model": "llama3.2", "created_at": "2025-06-01T10:00:00Z",
           "message": {"role": "assistant", "content": content}, "done": false})
}

fn done(reason: &str) -> Value {
    json!({"model": "llama3.2", "message": {"role": "assistant", "content": ""},
           "done": true, "done_reason": reason, "total_duration": 812_000_000u64,
           "prompt_eval_count": 26, "eval_count": 3})
}

#[tokio::test]
async fn text_stream_any_split() {
    let body = body(&[text("Ça "), text("va "), text("bien"), done("stop")]);

    for size in [1, 2, 7, body.len()] {
        let response = stream(&body, size).collect().await.unwrap();
        assert_eq!(response.text(), "Ça va bien");
        assert_eq!(response.model(), Some("llama3.2"));
        assert_eq!(response.stop_reason(), Some(StopReason::EndTurn));
        assert_eq!(response.usage().input_tokens, 26);
        assert_eq!(response.usage().output_tokens, 3);
        assert!(response.is_complete());
    }
}

#[tokio::test]
async fn done_line_ends_reading() {
    let mut body = body(&[text("one"), done("length")]);
    body.push_str(&format!("{}\n", text(" two")));

    let mut stream = stream(&body, 5);
    let mut texts = Vec::new();
    while let Some(event) = stream.next().await {
        if let StreamEvent::TextDelta { text, .. } = event.unwrap() {
            texts.push(text);
        }
    }
    assert_eq!(texts, ["one"]);

    let response = stream.into_response();
    assert_eq!(response.text(), "one");
    assert_eq!(response.stop_reason(), Some(StopReason::MaxTokens));
}

#[tokio::test]
async fn crlf_lines_and_missing_final_newline() {
    let body = format!("{}\r\n{}\r\n{}", text("a"), text("b"), done("stop"));
    let response = stream(&body, 3).collect().await.unwrap();
    assert_eq!(response.text(), "ab");
    assert!(response.is_complete());
}

#[tokio::test]
async fn tool_call_stream() {
    let body = body(&[
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": "", "tool_calls": [
            {"function": {"name": "get_weather", "arguments": {"city": "Toronto"}}}
        ]}, "done": false}),
        done("stop"),
    ]);

    let response = stream(&body, 4).collect().await.unwrap();
    assert_eq!(response.stop_reason(), Some(StopReason::ToolUse));
    let call = &response.tool_calls()[0];
    assert_eq!(call.id, "call_get_weather_0");
    assert_eq!(call.name, "get_weather");
    assert_eq!(call.arguments, ToolArguments::Parsed(json!({"city": "Toronto"})));
}

#[tokio::test]
async fn error_line_aborts_stream() {
    let body = body(&[text("partial"), json!({"error": "llama runner process has terminated"})]);
    let response = stream(&body, 9).collect().await.unwrap();
    assert_eq!(response.text(), "partial");
    assert_eq!(
        response.outcome(),
        &StreamOutcome::Aborted {
            reason: "llama runner process has terminated".into()
        }
    );
}

#[tokio::test]
async fn garbage_line_is_skipped() {
    let body = format!("{}not json at all\n{}", body(&[text("x")]), body(&[text("y"), done("stop")]));
    let stream = stream(&body, 4);
    let response = stream.collect().await.unwrap();
    assert_eq!(response.text(), "xy");
    assert!(response.is_complete());
}

#[tokio::test]
async fn clean_close_before_done_is_unterminated() {
    let body = body(&[text("still "), text("going")]);
    let response = stream(&body, 9).collect().await.unwrap();
    assert_eq!(response.text(), "still going");
    assert_eq!(response.stop_reason(), None);
    assert_eq!(response.outcome(), &StreamOutcome::Unterminated);
    assert!(!response.is_complete());
}

#[tokio::test]
async fn malformed_counts_keep_text() {
    let mut last = done("stop");
    last["eval_count"] = json!("three");
    let body = body(&[text("fine"), last]);
    let response = stream(&body, 4).collect().await.unwrap();
    assert_eq!(response.text(), "fine");
    assert_eq!(response.usage().input_tokens, 26);
    assert_eq!(response.usage().output_tokens, 0);
    assert!(response.is_complete());
}

#[tokio::test]
async fn connection_drop_keeps_partial_text() {
    let lines = vec![Bytes::from(body(&[text("half an ans")]))];
    let stream = StreamingResponse::new(
        failing_body(lines, "connection reset"),
        Box::new(OllamaDecoder::new()),
    );
    let response = stream.collect().await.unwrap();
    assert_eq!(response.text(), "half an ans");
    assert!(!response.is_complete());
}

#[tokio::test]
async fn mock_provider_drives_ollama_decoder() {
    let mock = mock_for("ollama", "llama3.2");
    mock.queue_stream(
        vec![Bytes::from(body(&[text("pong"), done("stop")]))],
        Box::new(OllamaDecoder::new()),
    );

    let params = ChatParams {
        messages: vec![user_msg("ping")],
        ..Default::default()
    };
    let response = mock.stream(&params).await.unwrap().collect().await.unwrap();
    assert_eq!(response.text(), "pong");
    assert!(response.is_complete());
}
