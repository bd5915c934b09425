//! Conversion between `llm-conduit` types and the Chat Completions wire format.

use std::borrow::Cow;

use llm_conduit::accumulator::ResponseBody;
use llm_conduit::error::ApiError;
use llm_conduit::provider::{ChatParams, ToolChoice};
use llm_conduit::{Content, LlmError, Message, Role, StopReason, Usage};
use serde_json::Value;

use crate::config::OpenAiConfig;
use crate::types::{
    self, ErrorResponse, FunctionCallRequest, FunctionDef, Request, ResponseUsage, StreamOptions,
    Tool, ToolCallRequest,
};

// ── Request conversion ───────────────────────────────────────────────

/// Builds a Chat Completions request. `params.system` is sent as a
/// leading system message.
pub(crate) fn build_request<'a>(
    params: &'a ChatParams,
    config: &'a OpenAiConfig,
    stream: bool,
) -> Result<Request<'a>, LlmError> {
    if params.messages.is_empty() && params.system.is_none() {
        return Err(LlmError::InvalidRequest(
            "openai request needs at least one message".into(),
        ));
    }

    let mut messages = Vec::with_capacity(params.messages.len() + 1);
    if let Some(system) = &params.system {
        messages.push(types::Message {
            role: "system",
            content: Some(Cow::Owned(Content::Text(system.clone()))),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(params.messages.iter().map(convert_message));

    let tools = params.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|t| Tool {
                tool_type: "function",
                function: FunctionDef {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect()
    });

    Ok(Request {
        model: &config.model,
        messages,
        temperature: params.temperature,
        max_completion_tokens: params.max_tokens,
        stream: stream.then_some(true),
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
        tools,
        tool_choice: params.tool_choice.as_ref().map(convert_tool_choice),
        extra: &params.metadata,
    })
}

fn convert_message(msg: &Message) -> types::Message<'_> {
    let role = match msg.role {
        Role::System => "system",
        Role::Developer => "developer",
        Role::User => "user",
        Role::Tool => "tool",
        _ => "assistant",
    };

    let tool_calls: Vec<_> = msg
        .tool_calls
        .iter()
        .map(|call| ToolCallRequest {
            id: &call.id,
            call_type: "function",
            function: FunctionCallRequest {
                name: &call.name,
                arguments: call.arguments.to_json_string(),
            },
        })
        .collect();

    // Assistant turns that only call tools carry `content: null`.
    let content = if msg.content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(Cow::Borrowed(&msg.content))
    };

    types::Message {
        role,
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: msg.tool_call_id.as_deref(),
    }
}

pub(crate) fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::None => Value::String("none".into()),
        ToolChoice::Required => Value::String("required".into()),
        ToolChoice::Specific(name) => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
        _ => Value::String("auto".into()),
    }
}

// ── Response conversion ──────────────────────────────────────────────

/// Converts a non-streaming body into the shared [`ResponseBody`].
pub(crate) fn convert_response(resp: types::Response) -> ResponseBody {
    let mut body = ResponseBody {
        id: resp.id.filter(|s| !s.is_empty()),
        model: resp.model.filter(|s| !s.is_empty()),
        usage: resp.usage.map(convert_usage),
        ..ResponseBody::default()
    };

    for choice in resp.choices {
        let slot = body.choice_mut(choice.index);
        let message = choice.message;
        slot.role = message.role.as_deref().and_then(Role::parse);
        slot.content = message.content.unwrap_or_default();
        slot.reasoning = message.reasoning_content.unwrap_or_default();
        slot.annotations = message.annotations.unwrap_or_default();
        for (i, call) in message.tool_calls.unwrap_or_default().into_iter().enumerate() {
            let fragment = slot.tool_call_mut(u32::try_from(i).unwrap_or(u32::MAX));
            fragment.id = Some(call.id).filter(|s| !s.is_empty());
            fragment.name = Some(call.function.name).filter(|s| !s.is_empty());
            fragment.arguments = call.function.arguments;
        }
        slot.finish_reason = choice.finish_reason.as_deref().map(convert_stop_reason);
    }

    body
}

/// Maps a usage block, keeping the provider's total when it sent one.
pub(crate) fn convert_usage(usage: ResponseUsage) -> Usage {
    Usage {
        reasoning_tokens: usage
            .completion_tokens_details
            .and_then(|d| d.reasoning_tokens),
        cache_read_tokens: usage.prompt_tokens_details.and_then(|d| d.cached_tokens),
        ..Usage::new(usage.prompt_tokens, usage.completion_tokens).with_total(usage.total_tokens)
    }
}

/// Maps a `finish_reason` string to a [`StopReason`].
pub(crate) fn convert_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFilter,
        other => {
            tracing::warn!(finish_reason = other, "Unexpected OpenAI finish_reason");
            StopReason::EndTurn
        }
    }
}

// ── Error conversion ─────────────────────────────────────────────────

/// Maps an error status and its body to [`LlmError::Api`].
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    let (code, message) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(resp) => (resp.error.code(), resp.error.message),
        Err(_) => (None, fallback_message(status, body)),
    };
    LlmError::Api(ApiError::new(status, code, message, body))
}

fn fallback_message(status: http::StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    } else {
        trimmed.to_owned()
    }
}
