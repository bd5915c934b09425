//! Conversion between `llm-conduit` types and the Messages API wire format.

use llm_conduit::accumulator::ResponseBody;
use llm_conduit::error::ApiError;
use llm_conduit::provider::{ChatParams, ToolChoice};
use llm_conduit::{Content, LlmError, Message, Role, StopReason, Usage};
use serde_json::Value;

use crate::config::AnthropicConfig;
use crate::types::{
    self, ContentBlock, ErrorResponse, Request, ResponseUsage, Tool, ToolChoiceParam,
};

// ── Request conversion ───────────────────────────────────────────────

/// Builds a Messages API request.
///
/// System and developer messages are lifted into the top-level `system`
/// field after `params.system`. Tool results travel as `user` turns.
pub(crate) fn build_request<'a>(
    params: &'a ChatParams,
    config: &'a AnthropicConfig,
    stream: bool,
) -> Result<Request<'a>, LlmError> {
    let messages = params
        .messages
        .iter()
        .filter(|m| !is_system(m.role))
        .map(convert_message)
        .collect::<Result<Vec<_>, _>>()?;

    if messages.is_empty() {
        return Err(LlmError::InvalidRequest(
            "anthropic request needs at least one non-system message".into(),
        ));
    }

    let tools = params.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|t| Tool {
                name: &t.name,
                description: &t.description,
                input_schema: &t.parameters,
            })
            .collect()
    });

    Ok(Request {
        model: &config.model,
        messages,
        max_tokens: params.max_tokens.unwrap_or(config.max_tokens),
        temperature: params.temperature,
        system: system_prompt(params),
        stream: stream.then_some(true),
        tools,
        tool_choice: params.tool_choice.as_ref().map(convert_tool_choice),
        extra: &params.metadata,
    })
}

fn is_system(role: Role) -> bool {
    matches!(role, Role::System | Role::Developer)
}

fn system_prompt(params: &ChatParams) -> Option<String> {
    let parts: Vec<&str> = params
        .system
        .as_deref()
        .into_iter()
        .chain(
            params
                .messages
                .iter()
                .filter(|m| is_system(m.role))
                .filter_map(Message::text),
        )
        .filter(|s| !s.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

fn convert_message(msg: &Message) -> Result<types::Message<'_>, LlmError> {
    if msg.role == Role::Tool {
        let tool_use_id = msg.tool_call_id.as_deref().ok_or_else(|| {
            LlmError::InvalidRequest("tool result message is missing tool_call_id".into())
        })?;
        let content = match &msg.content {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => Value::Array(parts.clone()).to_string(),
        };
        return Ok(types::Message {
            role: "user",
            content: vec![ContentBlock::ToolResult {
                tool_use_id,
                content,
            }],
        });
    }

    let mut content = content_blocks(&msg.content);
    content.extend(msg.tool_calls.iter().map(|call| ContentBlock::ToolUse {
        id: &call.id,
        name: &call.name,
        input: call
            .arguments
            .as_value()
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
    }));

    Ok(types::Message {
        role: if msg.role.is_model_output() {
            "assistant"
        } else {
            "user"
        },
        content,
    })
}

fn content_blocks(content: &Content) -> Vec<ContentBlock<'_>> {
    match content {
        // The API rejects empty text blocks.
        Content::Text(text) if text.is_empty() => Vec::new(),
        Content::Text(text) => vec![ContentBlock::Text { text }],
        Content::Parts(parts) => parts.iter().map(ContentBlock::Raw).collect(),
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> ToolChoiceParam<'_> {
    match choice {
        ToolChoice::None => ToolChoiceParam {
            choice_type: "none",
            name: None,
        },
        ToolChoice::Required => ToolChoiceParam {
            choice_type: "any",
            name: None,
        },
        ToolChoice::Specific(name) => ToolChoiceParam {
            choice_type: "tool",
            name: Some(name),
        },
        _ => ToolChoiceParam {
            choice_type: "auto",
            name: None,
        },
    }
}

// ── Response conversion ──────────────────────────────────────────────

/// Converts a non-streaming body into the shared [`ResponseBody`].
///
/// Anthropic has a single choice; content blocks are folded into it in
/// order: text is concatenated, thinking becomes reasoning, each
/// `tool_use` block becomes the next tool call.
pub(crate) fn convert_response(resp: types::Response) -> ResponseBody {
    let mut body = ResponseBody {
        id: resp.id.filter(|s| !s.is_empty()),
        model: resp.model.filter(|s| !s.is_empty()),
        usage: resp.usage.as_ref().map(|u| merge_usage(None, u)),
        ..ResponseBody::default()
    };

    let slot = body.choice_mut(0);
    slot.role = Some(
        resp.role
            .as_deref()
            .and_then(Role::parse)
            .unwrap_or(Role::Assistant),
    );
    let mut next_call = 0;
    for block in resp.content {
        match block.content_type.as_str() {
            "text" => {
                slot.content.push_str(block.text.as_deref().unwrap_or_default());
                slot.annotations
                    .extend(block.citations.unwrap_or_default());
            }
            "thinking" => slot
                .reasoning
                .push_str(block.thinking.as_deref().unwrap_or_default()),
            "tool_use" => {
                let fragment = slot.tool_call_mut(next_call);
                next_call += 1;
                fragment.id = block.id;
                fragment.name = block.name;
                fragment.arguments = block.input.map(|v| v.to_string()).unwrap_or_default();
            }
            other => tracing::debug!(block_type = other, "Ignoring Anthropic content block"),
        }
    }
    slot.finish_reason = resp.stop_reason.as_deref().map(convert_stop_reason);

    body
}

/// Applies a usage block over `prev`, field by field.
///
/// `message_start` carries the input counters and `message_delta` the
/// cumulative output count, so each field overwrites only when present.
pub(crate) fn merge_usage(prev: Option<&Usage>, update: &ResponseUsage) -> Usage {
    let mut usage = prev.cloned().unwrap_or_default();
    if let Some(n) = update.input_tokens {
        usage.input_tokens = n;
    }
    if let Some(n) = update.output_tokens {
        usage.output_tokens = n;
    }
    if let Some(n) = update.cache_read_input_tokens {
        usage.cache_read_tokens = Some(n);
    }
    if let Some(n) = update.cache_creation_input_tokens {
        usage.cache_write_tokens = Some(n);
    }
    usage.recompute_total();
    usage
}

/// Maps a `stop_reason` string to a [`StopReason`].
pub(crate) fn convert_stop_reason(reason: &str) -> StopReason {
    match reason {
        "end_turn" | "pause_turn" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        "refusal" => StopReason::ContentFilter,
        other => {
            tracing::warn!(stop_reason = other, "Unexpected Anthropic stop_reason");
            StopReason::EndTurn
        }
    }
}

// ── Error conversion ─────────────────────────────────────────────────

/// Maps an error status and its body to [`LlmError::Api`]. The error
/// `type` (`rate_limit_error`, `overloaded_error`, ...) is kept as the code.
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    let (code, message) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(resp) => (resp.error.error_type, resp.error.message),
        Err(_) => (None, body.trim().to_owned()),
    };
    LlmError::Api(ApiError::new(status, code, message, body))
}

#[cfg(test)]
mod tests {
    use llm_conduit::error::ApiErrorKind;
    use llm_conduit::provider::ToolDefinition;
    use llm_conduit::{Response, ToolArguments, ToolCall};

    use super::*;

    fn params(messages: Vec<Message>) -> ChatParams {
        ChatParams {
            messages,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_request_minimal() {
        let params = params(vec![Message::user("Hello")]);
        let config = AnthropicConfig::default();
        let req = build_request(&params, &config, false).unwrap();

        assert_eq!(req.model, "claude-sonnet-4-20250514");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.max_tokens, 4096);
        assert!(req.system.is_none());
        assert!(req.stream.is_none());
    }

    #[test]
    fn test_system_messages_lifted() {
        let mut params = params(vec![
            Message::system("Rule one."),
            Message::user("Hi"),
            Message::developer("Rule two."),
        ]);
        params.system = Some("Preamble.".into());
        let config = AnthropicConfig::default();
        let req = build_request(&params, &config, true).unwrap();

        assert_eq!(req.system.as_deref(), Some("Preamble.\n\nRule one.\n\nRule two."));
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.stream, Some(true));
    }

    #[test]
    fn test_only_system_is_rejected() {
        let params = params(vec![Message::system("alone")]);
        let err = build_request(&params, &AnthropicConfig::default(), false).unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_tool_round_trip_messages() {
        let call = ToolCall {
            id: "toolu_1".into(),
            name: "add".into(),
            arguments: ToolArguments::Parsed(serde_json::json!({"a": 1})),
        };
        let params = params(vec![
            Message::user("add"),
            Message::assistant_tool_calls(vec![call]),
            Message::tool_result("toolu_1", "2"),
        ]);
        let config = AnthropicConfig::default();
        let req = build_request(&params, &config, false).unwrap();
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["messages"][1]["content"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(json["messages"][1]["content"][0]["input"]["a"], 1);
        assert_eq!(json["messages"][2]["role"], "user");
        assert_eq!(json["messages"][2]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn test_tool_result_without_id_is_rejected() {
        let mut msg = Message::tool_result("x", "y");
        msg.tool_call_id = None;
        let err = build_request(&params(vec![msg]), &AnthropicConfig::default(), false)
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_tools_and_choice() {
        let mut params = params(vec![Message::user("Weather?")]);
        params.tools = Some(vec![ToolDefinition {
            name: "get_weather".into(),
            description: "Get weather".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]);
        params.tool_choice = Some(ToolChoice::Required);
        let config = AnthropicConfig::default();
        let req = build_request(&params, &config, false).unwrap();

        assert_eq!(req.tools.as_ref().unwrap()[0].name, "get_weather");
        assert_eq!(req.tool_choice.as_ref().unwrap().choice_type, "any");
        assert_eq!(
            convert_tool_choice(&ToolChoice::Specific("f".into())).name,
            Some("f")
        );
    }

    #[test]
    fn test_convert_response_blocks() {
        let resp: types::Response = serde_json::from_value(serde_json::json!({
            "id": "msg_01",
            "model": "claude-sonnet-4-20250514",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "Let me check."},
                {"type": "text", "text": "Checking ", "citations": [{"type": "char_location", "cited_text": "x"}]},
                {"type": "text", "text": "now."},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "rust"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 10, "cache_read_input_tokens": 5}
        }))
        .unwrap();

        let response = Response::from_body(convert_response(resp));
        assert_eq!(response.id(), Some("msg_01"));
        assert_eq!(response.text(), "Checking now.");
        assert_eq!(response.message().unwrap().reasoning.as_deref(), Some("Let me check."));
        assert_eq!(response.message().unwrap().annotations.len(), 1);
        assert_eq!(response.stop_reason(), Some(StopReason::ToolUse));
        assert_eq!(response.tool_calls()[0].id, "toolu_1");
        assert_eq!(
            response.tool_calls()[0].arguments,
            ToolArguments::Parsed(serde_json::json!({"q": "rust"}))
        );
        let usage = response.usage();
        assert_eq!(usage.total_tokens, 30);
        assert_eq!(usage.cache_read_tokens, Some(5));
    }

    #[test]
    fn test_merge_usage_field_wise() {
        let start = merge_usage(
            None,
            &ResponseUsage {
                input_tokens: Some(25),
                output_tokens: Some(1),
                ..Default::default()
            },
        );
        let end = merge_usage(
            Some(&start),
            &ResponseUsage {
                output_tokens: Some(15),
                ..Default::default()
            },
        );
        assert_eq!(end, Usage::new(25, 15));
    }

    #[test]
    fn test_stop_reasons() {
        assert_eq!(convert_stop_reason("end_turn"), StopReason::EndTurn);
        assert_eq!(convert_stop_reason("tool_use"), StopReason::ToolUse);
        assert_eq!(convert_stop_reason("max_tokens"), StopReason::MaxTokens);
        assert_eq!(convert_stop_reason("stop_sequence"), StopReason::StopSequence);
        assert_eq!(convert_stop_reason("refusal"), StopReason::ContentFilter);
        assert_eq!(convert_stop_reason("new_reason"), StopReason::EndTurn);
    }

    #[test]
    fn test_convert_error() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = convert_error(http::StatusCode::from_u16(529).unwrap(), body);
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Server));
        assert!(err.is_retryable());

        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"prompt is too long: 250000 tokens > 200000 maximum"}}"#;
        let err = convert_error(http::StatusCode::BAD_REQUEST, body);
        assert_eq!(err.api_kind(), Some(ApiErrorKind::ContextWindowExceeded));

        let err = convert_error(http::StatusCode::UNAUTHORIZED, "not json");
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Authentication));
    }
}
