//! Conversation types shared by every provider.
//!
//! A [`Message`] is used in both directions: callers build request
//! history with the constructors ([`Message::user`], [`Message::system`],
//! ...), and the [`Response`](crate::Response) adapter produces one
//! `Message` per choice, with `index`, `finish_reason`, tool calls and
//! annotations filled in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// The human side of the conversation.
    User,
    /// The model's reply (`OpenAI`, Anthropic, Ollama).
    #[default]
    Assistant,
    /// Developer instructions (`OpenAI` reasoning models).
    Developer,
    /// The model's reply in Gemini's vocabulary.
    Model,
    /// The result of a tool invocation.
    Tool,
}

impl Role {
    /// Parses a provider role string. Unknown roles yield `None`.
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "developer" => Some(Self::Developer),
            "model" => Some(Self::Model),
            "tool" | "function" => Some(Self::Tool),
            _ => None,
        }
    }

    /// The lowercase wire name of this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Developer => "developer",
            Self::Model => "model",
            Self::Tool => "tool",
        }
    }

    /// `true` for the roles a model replies with.
    pub fn is_model_output(self) -> bool {
        matches!(self, Self::Assistant | Self::Model)
    }
}

/// Message content: plain text, or provider-specific structured parts
/// (images, documents) passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// Structured parts in the target provider's own format.
    Parts(Vec<Value>),
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Content {
    /// The text, if this is [`Content::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }

    /// `true` for empty text or an empty part list.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StopReason {
    /// The model finished its turn naturally.
    EndTurn,
    /// The model wants the caller to run one or more tools.
    ToolUse,
    /// Generation hit the output token limit.
    MaxTokens,
    /// A caller-supplied stop sequence was produced.
    StopSequence,
    /// The provider withheld or truncated output for safety reasons.
    ContentFilter,
}

/// Tool-call arguments as reassembled from the provider.
///
/// Streams deliver arguments as JSON text fragments. If the stream is
/// cut short the concatenation may not parse; that is a data-quality
/// condition, not an error, and the text is kept as [`Raw`](Self::Raw).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// Arguments that parsed as JSON.
    Parsed(Value),
    /// Argument text that did not parse.
    Raw(String),
}

impl ToolArguments {
    /// The parsed value, or `None` for unparseable text.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// `true` when the arguments parsed as JSON.
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    /// Serializes back to the JSON text a provider expects in requests.
    pub fn to_json_string(&self) -> String {
        match self {
            Self::Parsed(value) => value.to_string(),
            Self::Raw(text) => text.clone(),
        }
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        Self::Parsed(value)
    }
}

/// A request from the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned (or synthesized) call identifier.
    pub id: String,
    /// The name of the tool to invoke.
    pub name: String,
    /// The arguments, parsed when possible.
    pub arguments: ToolArguments,
}

/// A single message in a conversation, or one choice of a response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// The message body.
    pub content: Content,
    /// Tool invocations requested by the model, in call-index order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For [`Role::Tool`] messages, the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// The provider's choice/candidate index.
    #[serde(default)]
    pub index: u32,
    /// Why generation stopped for this choice, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<StopReason>,
    /// Provider annotations (citations, URL references), passed through.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Value>,
    /// Reasoning or thinking text the provider exposed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            ..Self::default()
        }
    }

    /// A system message.
    pub fn system(content: impl Into<Content>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// A developer message.
    pub fn developer(content: impl Into<Content>) -> Self {
        Self::with_role(Role::Developer, content)
    }

    /// A user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// An assistant message (history replay).
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// An assistant message that requested the given tool calls.
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::with_role(Role::Assistant, "")
        }
    }

    /// The result of running a tool, answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// The text content, if the content is text.
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}
