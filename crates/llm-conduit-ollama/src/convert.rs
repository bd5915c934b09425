//! Conversion between `llm-conduit` types and Ollama API types.

use std::borrow::Cow;
use std::collections::HashMap;

use llm_conduit::accumulator::ResponseBody;
use llm_conduit::error::ApiError;
use llm_conduit::provider::{ChatParams, ToolChoice};
use llm_conduit::{Content, LlmError, Message, ResponseAccumulator, Role, StopReason, Usage};
use serde_json::Value;

use crate::config::OllamaConfig;
use crate::types::{
    self, ChatChunk, ErrorResponse, FunctionCallRequest, FunctionDef, Options, Request, Tool,
    ToolCallRequest,
};

// ── Request conversion ───────────────────────────────────────────────

/// Builds an `/api/chat` request.
pub(crate) fn build_request<'a>(
    params: &'a ChatParams,
    config: &'a OllamaConfig,
    stream: bool,
) -> Result<Request<'a>, LlmError> {
    let call_names: HashMap<&str, &str> = params
        .messages
        .iter()
        .flat_map(|m| &m.tool_calls)
        .map(|call| (call.id.as_str(), call.name.as_str()))
        .collect();

    let mut messages = Vec::with_capacity(params.messages.len() + 1);
    if let Some(system) = params.system.as_deref().filter(|s| !s.is_empty()) {
        messages.push(types::Message {
            role: "system",
            content: Cow::Borrowed(system),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_name: None,
        });
    }
    messages.extend(
        params
            .messages
            .iter()
            .map(|m| convert_message(m, &call_names)),
    );

    if messages.is_empty() {
        return Err(LlmError::InvalidRequest(
            "ollama request needs at least one message".into(),
        ));
    }

    // Ollama has no tool_choice: `None` drops the tools, anything else
    // leaves the decision to the model.
    let tools = match &params.tool_choice {
        Some(ToolChoice::None) => None,
        choice => {
            if matches!(choice, Some(ToolChoice::Required | ToolChoice::Specific(_))) {
                tracing::debug!("Ollama ignores forced tool choice");
            }
            params.tools.as_ref().map(|tools| {
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
            })
        }
    };

    let options = (params.temperature.is_some() || params.max_tokens.is_some()).then(|| Options {
        temperature: params.temperature,
        num_predict: params.max_tokens,
    });

    Ok(Request {
        model: &config.model,
        messages,
        stream,
        options,
        tools,
        extra: &params.metadata,
    })
}

fn convert_message<'a>(msg: &'a Message, call_names: &HashMap<&str, &'a str>) -> types::Message<'a> {
    let role = match msg.role {
        Role::System | Role::Developer => "system",
        Role::User => "user",
        Role::Tool => "tool",
        _ => "assistant",
    };

    let (content, images) = match &msg.content {
        Content::Text(text) => (Cow::Borrowed(text.as_str()), Vec::new()),
        Content::Parts(parts) => split_parts(parts),
    };

    let tool_calls = msg
        .tool_calls
        .iter()
        .map(|call| ToolCallRequest {
            function: FunctionCallRequest {
                name: &call.name,
                arguments: call
                    .arguments
                    .as_value()
                    .cloned()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            },
        })
        .collect();

    let tool_name = msg
        .tool_call_id
        .as_deref()
        .and_then(|id| call_names.get(id).copied());

    types::Message {
        role,
        content,
        images,
        tool_calls,
        tool_name,
    }
}

/// Splits structured parts into text and base64 images.
///
/// Recognized parts are `{"text": ".."}` and `{"image": "<base64>"}`;
/// anything else is dropped with a debug log.
fn split_parts(parts: &[Value]) -> (Cow<'_, str>, Vec<&str>) {
    let mut text = String::new();
    let mut images = Vec::new();
    for part in parts {
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            text.push_str(t);
        } else if let Some(image) = part.get("image").and_then(Value::as_str) {
            images.push(image);
        } else {
            tracing::debug!(part = %part, "Dropping content part Ollama cannot take");
        }
    }
    (Cow::Owned(text), images)
}

// ── Response conversion ──────────────────────────────────────────────

/// Converts a non-streaming body into the shared [`ResponseBody`].
pub(crate) fn convert_response(chunk: ChatChunk) -> ResponseBody {
    let mut acc = ResponseAccumulator::new();
    apply_chunk(chunk, &mut acc);
    acc.into_body()
}

/// Applies one chat line to `acc`. Ollama has a single choice.
///
/// Tool calls arrive whole, without ids; each gets `call_{name}_{n}`.
/// Finish reason and usage are read only from the `done` line.
pub(crate) fn apply_chunk(chunk: ChatChunk, acc: &mut ResponseAccumulator) {
    if let Some(error) = chunk.error {
        tracing::warn!(error = %error, "Ollama reported an error mid-stream");
        acc.abort(error);
        return;
    }
    if let Some(model) = &chunk.model {
        acc.set_model(model);
    }

    if let Some(message) = chunk.message {
        let role = message
            .role
            .as_deref()
            .and_then(Role::parse)
            .unwrap_or(Role::Assistant);
        acc.set_role(0, role);

        if let Some(thinking) = &message.thinking {
            acc.append_reasoning(0, thinking);
        }
        if let Some(content) = &message.content {
            acc.append_text(0, content);
        }
        for call in message.tool_calls {
            let call_index = u32::try_from(acc.tool_call_count(0)).unwrap_or(u32::MAX);
            let name = call.function.name;
            let id = format!("call_{name}_{call_index}");
            let arguments = match call.function.arguments {
                Value::Null => "{}".to_owned(),
                args => args.to_string(),
            };
            acc.tool_call_delta(
                0,
                call_index,
                Some(id.as_str()),
                Some(name.as_str()),
                Some(arguments.as_str()),
            );
        }
    }

    if chunk.done {
        let reason = convert_done_reason(chunk.done_reason.as_deref(), acc.tool_call_count(0) > 0);
        acc.set_finish_reason(0, reason);

        if chunk.prompt_eval_count.is_some() || chunk.eval_count.is_some() {
            acc.set_usage(Usage::new(
                chunk.prompt_eval_count.unwrap_or(0),
                chunk.eval_count.unwrap_or(0),
            ));
        }
    }
}

/// Maps `done_reason`. Ollama says `stop` after tool calls too.
pub(crate) fn convert_done_reason(reason: Option<&str>, has_tool_calls: bool) -> StopReason {
    if has_tool_calls {
        return StopReason::ToolUse;
    }
    match reason {
        Some("length") => StopReason::MaxTokens,
        None | Some("stop" | "load" | "unload") => StopReason::EndTurn,
        Some(other) => {
            tracing::warn!(done_reason = other, "Unexpected Ollama done_reason");
            StopReason::EndTurn
        }
    }
}

// ── Error conversion ─────────────────────────────────────────────────

/// Maps an error status and its `{"error": "..."}` body to [`LlmError::Api`].
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.trim().to_owned(), |e| e.error);
    LlmError::Api(ApiError::new(status, None, message, body))
}
