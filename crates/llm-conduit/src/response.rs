//! Uniform read-only view over a completed response body.
//!
//! [`Response`] wraps a [`ResponseBody`] regardless of where it came
//! from: a provider's non-streaming JSON converted in one go, or an
//! accumulator drained by a [`StreamingResponse`](crate::StreamingResponse).
//! None of its accessors fail. Missing data reads as empty.

use serde_json::Value;

use crate::accumulator::{ChoiceSlot, ResponseAccumulator, ResponseBody, StreamState};
use crate::chat::{Content, Message, StopReason, ToolArguments, ToolCall};
use crate::json::{JsonBackend, SerdeJson};
use crate::usage::Usage;

/// How the body behind a [`Response`] came to an end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamOutcome {
    /// The full response was received.
    #[default]
    Complete,
    /// The transport closed cleanly before the dialect's end marker. The
    /// body holds everything sent, but the model may not have finished.
    Unterminated,
    /// The stream stopped early; the body holds whatever arrived first.
    Aborted {
        /// Why the stream stopped.
        reason: String,
    },
}

/// A completed response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    body: ResponseBody,
    messages: Vec<Message>,
    outcome: StreamOutcome,
}

impl Response {
    /// Wraps a complete body, parsing tool arguments with `serde_json`.
    pub fn from_body(body: ResponseBody) -> Self {
        Self::from_body_with(body, &SerdeJson)
    }

    /// Wraps a complete body, parsing tool arguments with `json`.
    pub fn from_body_with(body: ResponseBody, json: &dyn JsonBackend) -> Self {
        let messages = body
            .choices
            .iter()
            .map(|(&index, slot)| to_message(index, slot, json))
            .collect();
        Self {
            body,
            messages,
            outcome: StreamOutcome::Complete,
        }
    }

    /// Wraps the final state of a stream.
    ///
    /// An accumulator that never reached a terminal state is treated as
    /// aborted.
    pub fn from_accumulator(acc: ResponseAccumulator, json: &dyn JsonBackend) -> Self {
        let outcome = match acc.state() {
            StreamState::Completed if acc.is_unterminated() => StreamOutcome::Unterminated,
            StreamState::Completed => StreamOutcome::Complete,
            StreamState::Aborted => StreamOutcome::Aborted {
                reason: acc.abort_reason().unwrap_or("aborted").to_owned(),
            },
            StreamState::Receiving => StreamOutcome::Aborted {
                reason: "stream not finished".into(),
            },
        };
        Self::from_body_with(acc.into_body(), json).with_outcome(outcome)
    }

    /// Replaces the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: StreamOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// One message per choice, in choice-index order. Possibly empty.
    pub fn choices(&self) -> &[Message] {
        &self.messages
    }

    /// Alias of [`choices`](Self::choices).
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The first choice, if any.
    pub fn message(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Text of the first choice, or `""`.
    pub fn text(&self) -> &str {
        self.message().and_then(Message::text).unwrap_or_default()
    }

    /// Token usage. All zeros when the provider sent none.
    pub fn usage(&self) -> Usage {
        self.body.usage.clone().unwrap_or_default()
    }

    /// The model the provider reported, if any.
    pub fn model(&self) -> Option<&str> {
        self.body.model.as_deref()
    }

    /// The provider's response id, if any.
    pub fn id(&self) -> Option<&str> {
        self.body.id.as_deref()
    }

    /// Tool calls of the first choice.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message()
            .map(|m| m.tool_calls.as_slice())
            .unwrap_or_default()
    }

    /// Why the first choice stopped, if known.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.message().and_then(|m| m.finish_reason)
    }

    /// Whether the body is complete.
    pub fn outcome(&self) -> &StreamOutcome {
        &self.outcome
    }

    /// `true` only for [`StreamOutcome::Complete`].
    pub fn is_complete(&self) -> bool {
        self.outcome == StreamOutcome::Complete
    }

    /// The underlying body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }
}

fn to_message(index: u32, slot: &ChoiceSlot, json: &dyn JsonBackend) -> Message {
    let tool_calls = slot
        .tool_calls
        .values()
        .map(|fragment| ToolCall {
            id: fragment.id.clone().unwrap_or_default(),
            name: fragment.name.clone().unwrap_or_default(),
            arguments: parse_arguments(&fragment.arguments, json),
        })
        .collect();

    Message {
        role: slot.role.unwrap_or_default(),
        content: Content::Text(slot.content.clone()),
        tool_calls,
        tool_call_id: None,
        index,
        finish_reason: slot.finish_reason,
        annotations: slot.annotations.clone(),
        reasoning: (!slot.reasoning.is_empty()).then(|| slot.reasoning.clone()),
    }
}

/// Empty text means a call with no arguments.
fn parse_arguments(text: &str, json: &dyn JsonBackend) -> ToolArguments {
    if text.trim().is_empty() {
        return ToolArguments::Parsed(Value::Object(serde_json::Map::new()));
    }
    match json.parse(text) {
        Ok(value) => ToolArguments::Parsed(value),
        Err(e) => {
            tracing::debug!(error = %e, "tool arguments kept as raw text");
            ToolArguments::Raw(text.to_owned())
        }
    }
}
