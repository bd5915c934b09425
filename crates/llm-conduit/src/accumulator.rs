//! The in-progress body of a streaming response.
//!
//! A [`ResponseAccumulator`] owns one [`ResponseBody`] and applies the
//! writes a [`StreamDecoder`](crate::StreamDecoder) derives from each
//! decoded chunk. Every provider's non-streaming conversion produces the
//! same [`ResponseBody`], so the [`Response`](crate::Response) adapter
//! reads a drained stream exactly as it reads a buffered body.
//!
//! Text and tool-call arguments only ever grow. Usage and finish reasons
//! are overwritten. Once the stream reaches a terminal state
//! ([`StreamState::Completed`] or [`StreamState::Aborted`]) all writes
//! are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{Role, StopReason};
use crate::stream::StreamEvent;
use crate::usage::Usage;

/// A provider-agnostic response body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Provider-assigned response identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The model that produced the response, as the provider reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Choices keyed by the provider's own choice index.
    #[serde(default)]
    pub choices: BTreeMap<u32, ChoiceSlot>,
    /// The latest usage block, if the provider sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ResponseBody {
    /// Returns the choice at `index`, creating an empty one if needed.
    pub fn choice_mut(&mut self, index: u32) -> &mut ChoiceSlot {
        self.choices.entry(index).or_default()
    }

    /// `true` when nothing at all has been recorded.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.model.is_none() && self.choices.is_empty() && self.usage.is_none()
    }
}

/// One choice (or candidate) of a response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChoiceSlot {
    /// The role the provider assigned, usually on the first chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Concatenated text output.
    #[serde(default)]
    pub content: String,
    /// Concatenated reasoning/thinking output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    /// Tool calls keyed by the provider's call index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_calls: BTreeMap<u32, ToolCallFragment>,
    /// Why generation stopped, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<StopReason>,
    /// Citations and similar provider annotations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Value>,
}

impl ChoiceSlot {
    /// Returns the tool call at `index`, creating an empty one if needed.
    pub fn tool_call_mut(&mut self, index: u32) -> &mut ToolCallFragment {
        self.tool_calls.entry(index).or_default()
    }
}

/// A tool call whose arguments may still be arriving.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Call identifier, once the provider has sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool name, once the provider has sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument JSON text, concatenated in arrival order.
    #[serde(default)]
    pub arguments: String,
}

/// Lifecycle of one streaming operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Chunks are still being applied.
    #[default]
    Receiving,
    /// The end sentinel was seen or the transport closed cleanly.
    Completed,
    /// The transport failed or the consumer gave up early.
    Aborted,
}

impl StreamState {
    /// `true` for [`Completed`](Self::Completed) and [`Aborted`](Self::Aborted).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Receiving)
    }
}

/// Mutable state of one streaming response.
///
/// Only the decoder of the owning stream writes to it. Each effective
/// write also records a normalized [`StreamEvent`], which the streaming
/// handle hands to callers.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    body: ResponseBody,
    state: StreamState,
    abort_reason: Option<String>,
    unterminated: bool,
    events: Vec<StreamEvent>,
    chunks: usize,
}

impl ResponseAccumulator {
    /// Creates an empty accumulator in the [`Receiving`](StreamState::Receiving) state.
    pub fn new() -> Self {
        Self::default()
    }

    fn writable(&self, field: &'static str) -> bool {
        if self.state.is_terminal() {
            tracing::trace!(field, state = ?self.state, "write after stream end ignored");
            return false;
        }
        true
    }

    /// Sets the response id. Later values overwrite earlier ones.
    pub fn set_id(&mut self, id: &str) {
        if self.writable("id") && !id.is_empty() {
            self.body.id = Some(id.to_owned());
        }
    }

    /// Sets the model name. Later values overwrite earlier ones.
    pub fn set_model(&mut self, model: &str) {
        if self.writable("model") && !model.is_empty() {
            self.body.model = Some(model.to_owned());
        }
    }

    /// Sets the role of choice `index`, creating the choice if needed.
    pub fn set_role(&mut self, index: u32, role: Role) {
        if self.writable("role") {
            self.body.choice_mut(index).role = Some(role);
        }
    }

    /// Appends a text delta to choice `index`.
    pub fn append_text(&mut self, index: u32, text: &str) {
        if !self.writable("content") {
            return;
        }
        let slot = self.body.choice_mut(index);
        if text.is_empty() {
            return;
        }
        slot.content.push_str(text);
        self.events.push(StreamEvent::TextDelta {
            index,
            text: text.to_owned(),
        });
    }

    /// Appends a reasoning delta to choice `index`.
    pub fn append_reasoning(&mut self, index: u32, text: &str) {
        if !self.writable("reasoning") {
            return;
        }
        let slot = self.body.choice_mut(index);
        if text.is_empty() {
            return;
        }
        slot.reasoning.push_str(text);
        self.events.push(StreamEvent::ReasoningDelta {
            index,
            text: text.to_owned(),
        });
    }

    /// Applies one tool-call fragment.
    ///
    /// `id` and `name` are set only when present and non-empty, the last
    /// such value winning. `arguments` is appended and never reset.
    pub fn tool_call_delta(
        &mut self,
        index: u32,
        call_index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        if !self.writable("tool_calls") {
            return;
        }
        let id = id.filter(|s| !s.is_empty());
        let name = name.filter(|s| !s.is_empty());
        let arguments = arguments.unwrap_or_default();

        let fragment = self.body.choice_mut(index).tool_call_mut(call_index);
        if let Some(id) = id {
            fragment.id = Some(id.to_owned());
        }
        if let Some(name) = name {
            fragment.name = Some(name.to_owned());
        }
        fragment.arguments.push_str(arguments);

        if id.is_some() || name.is_some() || !arguments.is_empty() {
            self.events.push(StreamEvent::ToolCallDelta {
                index,
                call_index,
                id: id.map(str::to_owned),
                name: name.map(str::to_owned),
                arguments: arguments.to_owned(),
            });
        }
    }

    /// Number of tool calls recorded so far for choice `index`.
    pub fn tool_call_count(&self, index: u32) -> usize {
        self.body
            .choices
            .get(&index)
            .map_or(0, |slot| slot.tool_calls.len())
    }

    /// Attaches a provider annotation (citation, URL reference) to choice `index`.
    pub fn add_annotation(&mut self, index: u32, annotation: Value) {
        if self.writable("annotations") {
            self.body.choice_mut(index).annotations.push(annotation);
        }
    }

    /// Sets why choice `index` stopped. Later values overwrite earlier ones.
    pub fn set_finish_reason(&mut self, index: u32, reason: StopReason) {
        if self.writable("finish_reason") {
            self.body.choice_mut(index).finish_reason = Some(reason);
            self.events.push(StreamEvent::Finish { index, reason });
        }
    }

    /// Replaces the usage block.
    ///
    /// Providers report cumulative counters, so the new value overwrites
    /// rather than adds to the previous one.
    pub fn set_usage(&mut self, usage: Usage) {
        if self.writable("usage") {
            self.events.push(StreamEvent::Usage(usage.clone()));
            self.body.usage = Some(usage);
        }
    }

    /// The latest usage block, if any.
    pub fn usage(&self) -> Option<&Usage> {
        self.body.usage.as_ref()
    }

    /// Marks one decoded chunk as applied.
    pub fn record_chunk(&mut self) {
        if !self.state.is_terminal() {
            self.chunks += 1;
        }
    }

    /// Number of decoded chunks applied so far.
    pub fn chunks_applied(&self) -> usize {
        self.chunks
    }

    /// Transitions to [`Completed`](StreamState::Completed).
    ///
    /// Returns `false` if the stream had already ended.
    pub fn complete(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = StreamState::Completed;
        true
    }

    /// Completes on a clean close that came before the dialect's end marker.
    ///
    /// Returns `false` if the stream had already ended.
    pub fn complete_unterminated(&mut self) -> bool {
        if !self.complete() {
            return false;
        }
        self.unterminated = true;
        true
    }

    /// `true` when the stream completed without its end marker.
    pub fn is_unterminated(&self) -> bool {
        self.unterminated
    }

    /// Transitions to [`Aborted`](StreamState::Aborted), keeping the partial body.
    ///
    /// Returns `false` if the stream had already ended.
    pub fn abort(&mut self, reason: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = StreamState::Aborted;
        self.abort_reason = Some(reason.into());
        true
    }

    /// The current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// `true` once completed or aborted.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Why the stream was aborted, if it was.
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// The body as accumulated so far.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// A copy of the body for progress reads while streaming.
    ///
    /// Fields are not guaranteed consistent with each other: a later
    /// snapshot may show usage for text an earlier one did not contain.
    pub fn snapshot(&self) -> ResponseBody {
        self.body.clone()
    }

    /// `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Takes the events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.events)
    }

    /// Consumes the accumulator, returning the body.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }
}
