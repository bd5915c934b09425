//! Integration tests against the live Anthropic API.
//!
//! Skipped (not failed) when `ANTHROPIC_API_KEY` is not set.
//!
//! ```sh
//! ANTHROPIC_API_KEY=sk-ant-... cargo test -p llm-conduit-anthropic --test integration
//! ```

use futures::StreamExt;
use llm_conduit::error::ApiErrorKind;
use llm_conduit::provider::{ChatParams, Provider, ToolChoice, ToolDefinition};
use llm_conduit::{Message, StopReason, StreamEvent};
use llm_conduit_anthropic::{AnthropicConfig, AnthropicProvider};

const MODEL: &str = "claude-3-5-haiku-20241022";

fn test_provider() -> Option<AnthropicProvider> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
    if api_key.is_empty() {
        return None;
    }
    Some(AnthropicProvider::new(AnthropicConfig {
        api_key,
        model: MODEL.into(),
        ..Default::default()
    }))
}

macro_rules! skip_without_key {
    () => {
        match test_provider() {
            Some(p) => p,
            None => {
                eprintln!("ANTHROPIC_API_KEY not set, skipping integration test");
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_simple_generate() {
    let provider = skip_without_key!();

    let params = ChatParams {
        system: Some("Reply with just the number.".into()),
        messages: vec![Message::user("What is 2+2?")],
        max_tokens: Some(16),
        ..Default::default()
    };

    let response = provider.generate(&params).await.unwrap();
    assert_eq!(response.stop_reason(), Some(StopReason::EndTurn));
    assert!(response.text().contains('4'), "got: {}", response.text());
    assert!(response.usage().input_tokens > 0);
    assert!(response.id().is_some_and(|id| id.starts_with("msg_")));
}

#[tokio::test]
async fn test_stream_text_matches_deltas() {
    let provider = skip_without_key!();

    let params = ChatParams {
        messages: vec![Message::user("Count from 1 to 5, separated by spaces.")],
        max_tokens: Some(32),
        ..Default::default()
    };

    let mut stream = provider.stream(&params).await.unwrap();
    let mut deltas = String::new();
    while let Some(event) = stream.next().await {
        if let StreamEvent::TextDelta { text, .. } = event.unwrap() {
            deltas.push_str(&text);
        }
    }
    let response = stream.into_response();

    assert!(response.is_complete());
    assert_eq!(response.text(), deltas);
    assert!(response.usage().input_tokens > 0);
    assert!(response.usage().output_tokens > 0);
}

#[tokio::test]
async fn test_stream_tool_use() {
    let provider = skip_without_key!();

    let params = ChatParams {
        messages: vec![Message::user("What's the weather in Paris?")],
        tools: Some(vec![ToolDefinition {
            name: "get_weather".into(),
            description: "Get the current weather for a city".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            }),
        }]),
        tool_choice: Some(ToolChoice::Specific("get_weather".into())),
        max_tokens: Some(128),
        ..Default::default()
    };

    let response = provider.stream(&params).await.unwrap().collect().await.unwrap();
    let call = &response.tool_calls()[0];
    assert_eq!(call.name, "get_weather");
    assert!(call.id.starts_with("toolu_"));
    assert!(call.arguments.is_parsed(), "got: {call:?}");
}

#[tokio::test]
async fn test_bad_key_is_auth_error() {
    if test_provider().is_none() {
        eprintln!("ANTHROPIC_API_KEY not set, skipping integration test");
        return;
    }
    let provider = AnthropicProvider::new(AnthropicConfig {
        api_key: "sk-ant-invalid".into(),
        ..Default::default()
    });

    let params = ChatParams {
        messages: vec![Message::user("hi")],
        ..Default::default()
    };
    let err = provider.generate(&params).await.unwrap_err();
    assert_eq!(err.api_kind(), Some(ApiErrorKind::Authentication));
}
