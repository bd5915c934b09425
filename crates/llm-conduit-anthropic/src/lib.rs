//! Anthropic Messages API provider for `llm-conduit`.
//!
//! Implements [`Provider`](llm_conduit::Provider) for `POST /v1/messages`
//! and the [`StreamDecoder`](llm_conduit::StreamDecoder) for its named
//! SSE events. Thinking blocks surface as reasoning, citations as
//! annotations, and usage is merged across `message_start` and
//! `message_delta`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use llm_conduit::{ChatParams, Message, Provider};
//! use llm_conduit_anthropic::{AnthropicConfig, AnthropicProvider};
//!
//! # async fn example() -> Result<(), llm_conduit::LlmError> {
//! let provider = AnthropicProvider::new(AnthropicConfig {
//!     api_key: std::env::var("ANTHROPIC_API_KEY").unwrap(),
//!     ..Default::default()
//! });
//!
//! let params = ChatParams {
//!     system: Some("Answer in one sentence.".into()),
//!     messages: vec![Message::user("Why is the sky blue?")],
//!     ..Default::default()
//! };
//!
//! let response = provider.stream(&params).await?.collect().await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

mod config;
mod convert;
mod factory;
mod provider;
mod stream;
mod types;

pub use config::AnthropicConfig;
pub use factory::{AnthropicFactory, register_global};
pub use provider::AnthropicProvider;
pub use stream::AnthropicDecoder;
