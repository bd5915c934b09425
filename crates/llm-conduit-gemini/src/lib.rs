//! Google Gemini provider for `llm-conduit`.
//!
//! Implements [`Provider`](llm_conduit::Provider) for `generateContent` and
//! the [`StreamDecoder`](llm_conduit::StreamDecoder) for
//! `streamGenerateContent?alt=sse`. Candidates map to choices by index,
//! thought parts to reasoning, and citation sources to annotations.
//! Function calls arrive whole and get `call_{name}_{n}` ids when the API
//! sends none.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_conduit::{ChatParams, Message, Provider, StreamEvent};
//! use llm_conduit_gemini::{GeminiConfig, GeminiProvider};
//!
//! # async fn example() -> Result<(), llm_conduit::LlmError> {
//! let provider = GeminiProvider::new(GeminiConfig {
//!     api_key: std::env::var("GEMINI_API_KEY").unwrap(),
//!     ..Default::default()
//! });
//!
//! let params = ChatParams {
//!     messages: vec![Message::user("Name three rivers.")],
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

pub use config::GeminiConfig;
pub use factory::{GeminiFactory, register_global};
pub use provider::GeminiProvider;
pub use stream::GeminiDecoder;
