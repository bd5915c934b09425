//! Anthropic Messages API wire types.

use std::collections::HashMap;

use llm_conduit::decoder::lenient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Request types ──────────────────────────────────────────────────

/// Body of `POST /v1/messages`.
#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub model: &'a str,
    pub messages: Vec<Message<'a>>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoiceParam<'a>>,
    /// `thinking`, `metadata`, `stop_sequences` and the like.
    #[serde(flatten)]
    pub extra: &'a HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Message<'a> {
    pub role: &'static str,
    pub content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub(crate) enum ContentBlock<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult { tool_use_id: &'a str, content: String },
    /// A part already in Anthropic's format (image, document, ...).
    #[serde(untagged)]
    Raw(&'a Value),
}

#[derive(Debug, Serialize)]
pub(crate) struct Tool<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub input_schema: &'a Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolChoiceParam<'a> {
    #[serde(rename = "type")]
    pub choice_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

// ── Response types ─────────────────────────────────────────────────

/// Body of a non-streaming response, and the `message` of `message_start`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Response {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<ResponseContent>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
}

/// One content block. Which fields are set depends on `type`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResponseContent {
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub citations: Option<Vec<Value>>,
}

/// Usage counters. Every field is optional because `message_delta`
/// only repeats the ones that changed.
#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
pub(crate) struct ResponseUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
}

// ── Error types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: String,
}

// ── Streaming types ────────────────────────────────────────────────

/// One named SSE event. The `type` field repeats the `event:` name.
///
/// Fields are lenient: one of an unexpected type reads as absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamEvent {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub event_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub index: Option<u32>,
    /// `message_start`
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<Response>,
    /// `content_block_start`
    #[serde(default, deserialize_with = "lenient")]
    pub content_block: Option<ResponseContent>,
    /// `content_block_delta`, `message_delta`
    #[serde(default, deserialize_with = "lenient")]
    pub delta: Option<StreamDelta>,
    /// `message_delta`
    #[serde(default, deserialize_with = "lenient")]
    pub usage: Option<ResponseUsage>,
    /// `error`
    #[serde(default, deserialize_with = "lenient")]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(rename = "type", default)]
    pub delta_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub partial_json: Option<String>,
    #[serde(default)]
    pub citation: Option<Value>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}
