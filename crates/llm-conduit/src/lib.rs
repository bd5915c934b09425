//! # llm-conduit
//!
//! Provider-agnostic streaming core for LLM clients.
//!
//! This crate turns a provider's streamed HTTP body into normalized
//! deltas while building the complete response those deltas add up to.
//! It contains no vendor code: each dialect lives in a sibling crate that
//! implements [`StreamDecoder`] and [`Provider`].
//!
//! | Crate | Dialect | Framing |
//! |-------|---------|---------|
//! | `llm-conduit-openai` | Chat Completions | SSE + `[DONE]` |
//! | `llm-conduit-anthropic` | Messages | SSE, named events |
//! | `llm-conduit-gemini` | `streamGenerateContent` | SSE |
//! | `llm-conduit-ollama` | `/api/chat` | newline-delimited JSON |
//!
//! # Pipeline
//!
//! ```text
//!  body bytes ──▶ EventParser ──▶ Dispatcher ──▶ StreamDecoder ──▶ ResponseAccumulator
//!   (sse)           (sse)         (dispatch)       (decoder)          (accumulator)
//!                                     │                                    │
//!                         malformed frames skipped             StreamEvents │ final body
//!                                                                  ▼        ▼
//!                                                     StreamingResponse ──▶ Response
//! ```
//!
//! Non-streaming calls skip straight to the end: each provider converts
//! its JSON body into the same [`ResponseBody`] and wraps it in a
//! [`Response`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use llm_conduit::{ChatParams, Message, Provider};
//!
//! # async fn example(provider: impl Provider) -> Result<(), llm_conduit::LlmError> {
//! let params = ChatParams {
//!     messages: vec![Message::user("Explain ownership in Rust")],
//!     max_tokens: Some(1024),
//!     ..Default::default()
//! };
//!
//! let response = provider.stream(&params).await?.collect().await?;
//! println!("{} ({} tokens)", response.text(), response.usage().total_tokens);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sse`] | Incremental event parser (SSE and line framing) |
//! | [`dispatch`] | Event-to-decoder routing, malformed-frame isolation |
//! | [`decoder`] | The per-dialect [`StreamDecoder`] trait |
//! | [`accumulator`] | [`ResponseAccumulator`] and the structured [`ResponseBody`] |
//! | [`response`] | The [`Response`] read view |
//! | [`stream`] | [`StreamingResponse`] and [`StreamEvent`] |
//! | [`json`] | Pluggable [`JsonBackend`] |
//! | [`chat`] | Messages, roles, tool calls |
//! | [`provider`] | [`Provider`] trait and request parameters |
//! | [`registry`] | Configuration-driven provider construction |
//! | [`error`] | Unified [`LlmError`] |
//! | [`usage`] | Token counts |

pub mod accumulator;
pub mod chat;
pub mod decoder;
pub mod dispatch;
pub mod error;
pub mod json;
pub mod provider;
pub mod registry;
pub mod response;
pub mod sse;
pub mod stream;
pub mod usage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use accumulator::{ResponseAccumulator, ResponseBody, StreamState};
pub use chat::{Content, Message, Role, StopReason, ToolArguments, ToolCall};
pub use decoder::StreamDecoder;
pub use error::LlmError;
pub use json::JsonBackend;
pub use provider::{ChatParams, DynProvider, Provider, ToolChoice, ToolDefinition};
pub use registry::ProviderRegistry;
pub use response::{Response, StreamOutcome};
pub use stream::{StreamEvent, StreamingResponse};
pub use usage::Usage;
