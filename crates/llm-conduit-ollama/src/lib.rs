//! Ollama provider for `llm-conduit`.
//!
//! Talks to `/api/chat` on a local or remote Ollama server. Streaming
//! responses are newline-delimited JSON rather than SSE; the
//! [`OllamaDecoder`] reads them with line framing and completes the
//! stream on the `done: true` line.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_conduit::{ChatParams, Message, Provider, StreamEvent};
//! use llm_conduit_ollama::{OllamaConfig, OllamaProvider};
//!
//! # async fn example() -> Result<(), llm_conduit::LlmError> {
//! let provider = OllamaProvider::new(OllamaConfig::default());
//!
//! let params = ChatParams {
//!     messages: vec![Message::user("Why is the sky blue?")],
//!     ..Default::default()
//! };
//! let mut stream = provider.stream(&params).await?;
//! while let Some(event) = stream.next().await {
//!     if let StreamEvent::TextDelta { text, .. } = event? {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod convert;
mod factory;
mod provider;
mod stream;
mod types;

pub use config::OllamaConfig;
pub use factory::{OllamaFactory, register_global};
pub use provider::OllamaProvider;
pub use stream::OllamaDecoder;
