//! Provider trait and request types.
//!
//! - **[`Provider`]** is what every dialect crate implements, using
//!   native async-fn-in-traits.
//! - **[`DynProvider`]** is its object-safe mirror with boxed futures. A
//!   blanket impl covers every `Provider`, so any backend can be stored
//!   as `Box<dyn DynProvider>` (which is what the
//!   [`registry`](crate::registry) hands out).
//!
//! All request configuration lives in [`ChatParams`]. Its
//! [`timeout`](ChatParams::timeout) and
//! [`extra_headers`](ChatParams::extra_headers) fields are transport
//! concerns and are skipped during serialization.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::Message;
use crate::error::LlmError;
use crate::response::Response;
use crate::stream::StreamingResponse;

/// The core trait every LLM provider implements.
///
/// `Provider` is not object-safe; use [`DynProvider`] behind `dyn`.
pub trait Provider: Send + Sync {
    /// Sends a request and returns the full, buffered response.
    fn generate(&self, params: &ChatParams)
    -> impl Future<Output = Result<Response, LlmError>> + Send;

    /// Sends a streaming request.
    ///
    /// Resolves once the response headers arrive. An error status is
    /// returned here as [`LlmError::Api`], before any streaming starts.
    fn stream(
        &self,
        params: &ChatParams,
    ) -> impl Future<Output = Result<StreamingResponse, LlmError>> + Send;

    /// Static metadata describing this provider instance.
    fn metadata(&self) -> ProviderMetadata;
}

/// Object-safe counterpart of [`Provider`].
///
/// ```rust,no_run
/// use llm_conduit::{ChatParams, DynProvider, Message};
///
/// async fn ask(provider: &dyn DynProvider, question: &str) -> String {
///     let params = ChatParams {
///         messages: vec![Message::user(question)],
///         ..Default::default()
///     };
///     let stream = provider.stream_boxed(&params).await.unwrap();
///     stream.collect().await.unwrap().text().to_owned()
/// }
/// ```
pub trait DynProvider: Send + Sync {
    /// Boxed-future version of [`Provider::generate`].
    fn generate_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<Response, LlmError>> + Send + 'a>>;

    /// Boxed-future version of [`Provider::stream`].
    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<StreamingResponse, LlmError>> + Send + 'a>>;

    /// Static metadata describing this provider instance.
    fn metadata(&self) -> ProviderMetadata;
}

impl<T: Provider> DynProvider for T {
    fn generate_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<Response, LlmError>> + Send + 'a>> {
        Box::pin(self.generate(params))
    }

    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<StreamingResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.stream(params))
    }

    fn metadata(&self) -> ProviderMetadata {
        Provider::metadata(self)
    }
}

/// Describes a provider instance: its name, model, and capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider name (`"openai"`, `"anthropic"`, ...).
    pub name: Cow<'static, str>,
    /// The configured model identifier.
    pub model: String,
    /// Context window size in tokens, as far as the provider crate knows.
    pub context_window: u64,
    /// Features this provider supports.
    pub capabilities: HashSet<Capability>,
}

/// A feature a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Function/tool calling.
    Tools,
    /// Reasoning or thinking output.
    Reasoning,
    /// Image understanding.
    Vision,
    /// Citations or URL annotations on the output.
    Citations,
}

/// Parameters for a chat request.
///
/// ```rust
/// use llm_conduit::{ChatParams, Message};
///
/// let params = ChatParams {
///     messages: vec![Message::user("Hello")],
///     max_tokens: Some(256),
///     temperature: Some(0.7),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatParams {
    /// The conversation history.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke.
    pub tools: Option<Vec<ToolDefinition>>,
    /// Whether and how the model uses tools.
    pub tool_choice: Option<ToolChoice>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// System prompt, for providers that take it outside the message list.
    pub system: Option<String>,
    /// Per-request timeout. Skipped during serialization.
    #[serde(skip)]
    pub timeout: Option<Duration>,
    /// Extra HTTP headers for this request. Skipped during serialization.
    #[serde(skip)]
    pub extra_headers: Option<http::HeaderMap>,
    /// Provider-specific top-level request fields, merged into the body.
    pub metadata: HashMap<String, Value>,
}

/// A tool the model can invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool's name.
    pub name: String,
    /// What the tool does, shown to the model.
    pub description: String,
    /// JSON Schema of the tool's input.
    pub parameters: Value,
}

/// Controls whether the model uses tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ToolChoice {
    /// The model decides.
    Auto,
    /// The model must not call tools.
    None,
    /// The model must call at least one tool.
    Required,
    /// The model must call this tool.
    Specific(String),
}
