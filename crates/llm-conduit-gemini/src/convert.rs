//! Conversion between `llm-conduit` types and the Gemini wire format.

use std::collections::HashMap;

use llm_conduit::accumulator::ResponseBody;
use llm_conduit::error::ApiError;
use llm_conduit::provider::{ChatParams, ToolChoice};
use llm_conduit::{Content, LlmError, Message, ResponseAccumulator, Role, StopReason, Usage};
use serde_json::Value;

use crate::types::{
    self, ErrorResponse, FunctionCallingConfig, FunctionDeclaration, GenerateResponse,
    GenerationConfig, Part, Request, SystemInstruction, TextPart, ToolConfig, ToolGroup,
    UsageMetadata,
};

// ── Request conversion ───────────────────────────────────────────────

/// Builds a `generateContent` request. The same body is used for
/// streaming; only the endpoint differs.
pub(crate) fn build_request(params: &ChatParams) -> Result<Request<'_>, LlmError> {
    // functionResponse parts need the tool name, which only the earlier
    // assistant turn knows.
    let call_names: HashMap<&str, &str> = params
        .messages
        .iter()
        .flat_map(|m| &m.tool_calls)
        .map(|call| (call.id.as_str(), call.name.as_str()))
        .collect();

    let contents: Vec<_> = params
        .messages
        .iter()
        .filter(|m| !is_system(m.role))
        .map(|m| convert_message(m, &call_names))
        .collect::<Result<_, _>>()?;

    if contents.is_empty() {
        return Err(LlmError::InvalidRequest(
            "gemini request needs at least one non-system message".into(),
        ));
    }

    let generation_config = (params.temperature.is_some() || params.max_tokens.is_some())
        .then(|| GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
        });

    let tools = params.tools.as_ref().map(|tools| {
        vec![ToolGroup {
            function_declarations: tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                })
                .collect(),
        }]
    });

    Ok(Request {
        contents,
        system_instruction: system_instruction(params),
        generation_config,
        tools,
        tool_config: params.tool_choice.as_ref().map(convert_tool_choice),
        extra: &params.metadata,
    })
}

fn is_system(role: Role) -> bool {
    matches!(role, Role::System | Role::Developer)
}

fn system_instruction(params: &ChatParams) -> Option<SystemInstruction> {
    let parts: Vec<TextPart> = params
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
        .map(|text| TextPart {
            text: text.to_owned(),
        })
        .collect();
    (!parts.is_empty()).then_some(SystemInstruction { parts })
}

fn convert_message<'a>(
    msg: &'a Message,
    call_names: &HashMap<&str, &str>,
) -> Result<types::Content<'a>, LlmError> {
    if msg.role == Role::Tool {
        let call_id = msg.tool_call_id.as_deref().ok_or_else(|| {
            LlmError::InvalidRequest("tool result message is missing tool_call_id".into())
        })?;
        let name = call_names.get(call_id).copied().unwrap_or(call_id);
        return Ok(types::Content {
            role: "user",
            parts: vec![Part::FunctionResponse {
                name: name.to_owned(),
                response: function_response(&msg.content),
            }],
        });
    }

    let mut parts: Vec<Part<'_>> = match &msg.content {
        Content::Text(text) if text.is_empty() => Vec::new(),
        Content::Text(text) => vec![Part::Text(text)],
        Content::Parts(parts) => parts.iter().map(Part::Raw).collect(),
    };
    parts.extend(msg.tool_calls.iter().map(|call| Part::FunctionCall {
        name: &call.name,
        args: call
            .arguments
            .as_value()
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
    }));

    Ok(types::Content {
        role: if msg.role.is_model_output() {
            "model"
        } else {
            "user"
        },
        parts,
    })
}

/// `functionResponse.response` must be an object: JSON objects pass
/// through, anything else is wrapped as `{"content": ...}`.
fn function_response(content: &Content) -> Value {
    match content {
        Content::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => value,
            _ => serde_json::json!({ "content": text }),
        },
        Content::Parts(parts) => serde_json::json!({ "content": parts }),
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> ToolConfig<'_> {
    let (mode, allowed_function_names) = match choice {
        ToolChoice::None => ("NONE", None),
        ToolChoice::Required => ("ANY", None),
        ToolChoice::Specific(name) => ("ANY", Some(vec![name.as_str()])),
        _ => ("AUTO", None),
    };
    ToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode,
            allowed_function_names,
        },
    }
}

// ── Response conversion ──────────────────────────────────────────────

/// Converts a non-streaming body into the shared [`ResponseBody`].
pub(crate) fn convert_response(resp: GenerateResponse) -> ResponseBody {
    let mut acc = ResponseAccumulator::new();
    apply_response(resp, &mut acc);
    acc.into_body()
}

/// Applies one `GenerateContentResponse` to `acc`.
///
/// Text parts are deltas when streaming and the whole text otherwise, so
/// one routine serves both paths. Function calls always arrive whole;
/// each gets the next call index of its candidate. An in-band `error`
/// aborts the stream.
pub(crate) fn apply_response(resp: GenerateResponse, acc: &mut ResponseAccumulator) {
    if let Some(error) = &resp.error {
        tracing::warn!(
            code = ?error.code,
            status = ?error.status,
            message = %error.message,
            "Gemini reported an error mid-stream"
        );
        let reason = match &error.status {
            Some(status) => format!("{status}: {}", error.message),
            None => error.message.clone(),
        };
        acc.abort(reason);
        return;
    }
    if let Some(id) = &resp.response_id {
        acc.set_id(id);
    }
    if let Some(model) = &resp.model_version {
        acc.set_model(model);
    }

    for (position, candidate) in resp.candidates.into_iter().enumerate() {
        let index = candidate
            .index
            .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));

        if let Some(content) = candidate.content {
            let role = content
                .role
                .as_deref()
                .and_then(Role::parse)
                .unwrap_or(Role::Model);
            acc.set_role(index, role);

            for part in content.parts {
                if let Some(text) = &part.text {
                    if part.thought.unwrap_or(false) {
                        acc.append_reasoning(index, text);
                    } else {
                        acc.append_text(index, text);
                    }
                }
                if let Some(call) = part.function_call {
                    let call_index = u32::try_from(acc.tool_call_count(index)).unwrap_or(u32::MAX);
                    let id = call
                        .id
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| format!("call_{}_{call_index}", call.name));
                    let args = call
                        .args
                        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                    acc.tool_call_delta(
                        index,
                        call_index,
                        Some(id.as_str()),
                        Some(call.name.as_str()),
                        Some(args.to_string().as_str()),
                    );
                }
            }
        }

        for citation in candidate
            .citation_metadata
            .map(|c| c.citation_sources)
            .unwrap_or_default()
        {
            acc.add_annotation(index, citation);
        }

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if let Some(reason) = convert_finish_reason(reason, acc.tool_call_count(index) > 0) {
                acc.set_finish_reason(index, reason);
            }
        }
    }

    // Cumulative on every chunk; the last one wins.
    if let Some(usage) = resp.usage_metadata {
        acc.set_usage(convert_usage(&usage));
    }
}

/// Maps a `finishReason`. Gemini reports `STOP` even when the turn ended
/// in function calls, so `has_tool_calls` upgrades it to `ToolUse`.
/// `FINISH_REASON_UNSPECIFIED` maps to `None`.
pub(crate) fn convert_finish_reason(reason: &str, has_tool_calls: bool) -> Option<StopReason> {
    let reason = match reason {
        "FINISH_REASON_UNSPECIFIED" => return None,
        "STOP" if has_tool_calls => StopReason::ToolUse,
        "STOP" => StopReason::EndTurn,
        "MAX_TOKENS" => StopReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
        | "IMAGE_SAFETY" => StopReason::ContentFilter,
        other => {
            tracing::warn!(finish_reason = other, "Unexpected Gemini finishReason");
            StopReason::EndTurn
        }
    };
    Some(reason)
}

pub(crate) fn convert_usage(usage: &UsageMetadata) -> Usage {
    Usage {
        reasoning_tokens: usage.thoughts_token_count,
        cache_read_tokens: usage.cached_content_token_count,
        ..Usage::new(usage.prompt_token_count, usage.candidates_token_count)
            .with_total(usage.total_token_count)
    }
}

// ── Error conversion ─────────────────────────────────────────────────

/// Maps an error status and its body to [`LlmError::Api`]. The gRPC-style
/// `status` (`RESOURCE_EXHAUSTED`, `UNAUTHENTICATED`, ...) becomes the
/// lowercase error code.
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    // Errors may also come wrapped in a one-element array.
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok().or_else(|| {
        serde_json::from_str::<Vec<ErrorResponse>>(body)
            .ok()
            .and_then(|v| v.into_iter().next())
    });
    let (code, message) = match parsed {
        Some(resp) => (
            resp.error.status.map(|s| s.to_ascii_lowercase()),
            resp.error.message,
        ),
        None => (None, body.trim().to_owned()),
    };
    LlmError::Api(ApiError::new(status, code, message, body))
}
