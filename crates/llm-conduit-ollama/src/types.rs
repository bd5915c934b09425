//! Ollama `/api/chat` wire types.
//!
//! Streaming lines and the non-streaming body share one shape, so
//! [`ChatChunk`] serves both.

use std::borrow::Cow;
use std::collections::HashMap;

use llm_conduit::decoder::lenient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Request types ──────────────────────────────────────────────────

/// Body of `POST /api/chat`.
#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub model: &'a str,
    pub messages: Vec<Message<'a>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool<'a>>>,
    /// `format`, `think`, `keep_alive` and the like.
    #[serde(flatten)]
    pub extra: &'a HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Message<'a> {
    pub role: &'static str,
    pub content: Cow<'a, str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest<'a>>,
    /// For `tool` messages: which tool produced this result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolCallRequest<'a> {
    pub function: FunctionCallRequest<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FunctionCallRequest<'a> {
    pub name: &'a str,
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct Tool<'a> {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDef<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FunctionDef<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub parameters: &'a Value,
}

// ── Response types ─────────────────────────────────────────────────

/// One streamed line, or the whole non-streaming body.
///
/// Fields are lenient: one of an unexpected type reads as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ChatChunk {
    #[serde(deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub message: Option<ResponseMessage>,
    #[serde(deserialize_with = "lenient")]
    pub done: bool,
    /// `"stop"`, `"length"`, `"load"`, ...
    #[serde(deserialize_with = "lenient")]
    pub done_reason: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub prompt_eval_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub eval_count: Option<u64>,
    /// Set instead of everything else when generation fails mid-stream.
    #[serde(deserialize_with = "lenient")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ResponseMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub thinking: Option<String>,
    pub tool_calls: Vec<ToolCallResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ToolCallResponse {
    pub function: FunctionCallResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FunctionCallResponse {
    pub name: String,
    pub arguments: Value,
}

// ── Error types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}
