//! `OpenAI` Chat Completions provider for `llm-conduit`.
//!
//! Implements [`Provider`](llm_conduit::Provider) for `POST /chat/completions`
//! and the [`StreamDecoder`](llm_conduit::StreamDecoder) for its SSE
//! dialect. Any server speaking the same protocol works through
//! [`OpenAiConfig::base_url`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_conduit::{ChatParams, Message, Provider, StreamEvent};
//! use llm_conduit_openai::{OpenAiConfig, OpenAiProvider};
//!
//! # async fn example() -> Result<(), llm_conduit::LlmError> {
//! let provider = OpenAiProvider::new(OpenAiConfig {
//!     api_key: std::env::var("OPENAI_API_KEY").unwrap(),
//!     model: "gpt-4o-mini".into(),
//!     ..Default::default()
//! });
//!
//! let params = ChatParams {
//!     messages: vec![Message::user("Write a haiku about ferris")],
//!     ..Default::default()
//! };
//!
//! let mut stream = provider.stream(&params).await?;
//! while let Some(event) = stream.next().await {
//!     if let StreamEvent::TextDelta { text, .. } = event? {
//!         print!("{text}");
//!     }
//! }
//! let response = stream.into_response();
//! println!("\n{} tokens", response.usage().total_tokens);
//! # Ok(())
//! # }
//! ```

mod config;
mod convert;
mod factory;
mod provider;
mod stream;
mod types;

pub use config::OpenAiConfig;
pub use factory::{OpenAiFactory, register_global};
pub use provider::OpenAiProvider;
pub use stream::OpenAiDecoder;
