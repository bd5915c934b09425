//! The streaming handle returned by [`Provider::stream`](crate::Provider::stream).
//!
//! A [`StreamingResponse`] drives the whole pipeline for one request:
//! body bytes go through the [`EventParser`], each event through the
//! [`Dispatcher`] and the dialect's decoder into a
//! [`ResponseAccumulator`](crate::ResponseAccumulator). Callers pick one
//! of three ways to consume it:
//!
//! - **pull**: it is a `futures::Stream` of normalized [`StreamEvent`]s;
//! - **push**: [`for_each_event`](StreamingResponse::for_each_event)
//!   runs a callback per event and returns the final [`Response`];
//! - **wait**: [`collect`](StreamingResponse::collect) ignores the
//!   events and returns only the final [`Response`].
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_conduit::{StreamEvent, StreamingResponse};
//!
//! async fn print_stream(mut stream: StreamingResponse) {
//!     while let Some(event) = stream.next().await {
//!         match event {
//!             Ok(StreamEvent::TextDelta { text, .. }) => print!("{text}"),
//!             Ok(_) => {}
//!             Err(e) => eprintln!("stream error: {e}"),
//!         }
//!     }
//!     let response = stream.into_response();
//!     println!("\n[{} tokens]", response.usage().total_tokens);
//! }
//! ```
//!
//! A transport failure ends the stream with one `Err` item. The partial
//! body is kept: [`into_response`](StreamingResponse::into_response)
//! still returns everything decoded up to that point, marked
//! [`Aborted`](crate::StreamOutcome::Aborted). A clean close before the
//! end marker of a dialect that always sends one is reported as
//! [`Unterminated`](crate::StreamOutcome::Unterminated).

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::accumulator::{ResponseBody, StreamState};
use crate::chat::StopReason;
use crate::decoder::StreamDecoder;
use crate::dispatch::Dispatcher;
use crate::error::LlmError;
use crate::json::{JsonBackend, default_backend};
use crate::response::Response;
use crate::sse::{Event, EventParser};
use crate::usage::Usage;

/// A pinned, boxed, `Send` stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, LlmError>> + Send>>;

/// Boxes any byte stream, mapping its errors to transport errors.
///
/// ```rust,ignore
/// let body = llm_conduit::stream::byte_stream(response.bytes_stream());
/// ```
pub fn byte_stream<S, B, E>(body: S) -> ByteStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Into<Bytes>,
    E: fmt::Display,
{
    Box::pin(body.map(|chunk| chunk.map(Into::into).map_err(LlmError::transport)))
}

/// A normalized increment of model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StreamEvent {
    /// Text appended to a choice.
    TextDelta {
        /// Choice index.
        index: u32,
        /// The appended text.
        text: String,
    },
    /// Reasoning/thinking text appended to a choice.
    ReasoningDelta {
        /// Choice index.
        index: u32,
        /// The appended text.
        text: String,
    },
    /// A fragment of a tool call.
    ToolCallDelta {
        /// Choice index.
        index: u32,
        /// Index of the call within the choice.
        call_index: u32,
        /// Call id, when this fragment carried one.
        id: Option<String>,
        /// Tool name, when this fragment carried one.
        name: Option<String>,
        /// Argument JSON text appended by this fragment.
        arguments: String,
    },
    /// A choice stopped.
    Finish {
        /// Choice index.
        index: u32,
        /// Why generation stopped.
        reason: StopReason,
    },
    /// The provider reported (cumulative) usage.
    Usage(Usage),
}

/// A response being streamed.
///
/// The body is read only while the handle is polled. Dropping the handle
/// closes the body and frees the parser buffers.
pub struct StreamingResponse {
    body: Option<ByteStream>,
    parser: EventParser,
    dispatcher: Dispatcher,
    pending: VecDeque<StreamEvent>,
    failure: Option<LlmError>,
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("reading", &self.body.is_some())
            .field("dispatcher", &self.dispatcher)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    /// Wraps a body using the default JSON backend.
    pub fn new(body: ByteStream, decoder: Box<dyn StreamDecoder>) -> Self {
        Self::with_json_backend(body, decoder, default_backend())
    }

    /// Wraps a body, parsing every payload with `json`.
    pub fn with_json_backend(
        body: ByteStream,
        decoder: Box<dyn StreamDecoder>,
        json: Arc<dyn JsonBackend>,
    ) -> Self {
        let parser = EventParser::new(decoder.parser_config());
        Self {
            body: Some(body),
            parser,
            dispatcher: Dispatcher::new(decoder, json),
            pending: VecDeque::new(),
            failure: None,
        }
    }

    /// Wraps an already-buffered body. Mostly useful for replaying captures.
    pub fn from_bytes(
        chunks: Vec<Bytes>,
        decoder: Box<dyn StreamDecoder>,
        json: Arc<dyn JsonBackend>,
    ) -> Self {
        let body: ByteStream = Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)));
        Self::with_json_backend(body, decoder, json)
    }

    /// The stream's lifecycle state.
    pub fn state(&self) -> StreamState {
        self.dispatcher.accumulator().state()
    }

    /// Number of frames dropped as malformed so far.
    pub fn skipped_frames(&self) -> usize {
        self.dispatcher.skipped()
    }

    /// A copy of everything accumulated so far.
    pub fn snapshot(&self) -> ResponseBody {
        self.dispatcher.accumulator().snapshot()
    }

    /// Drains the stream and returns the final response.
    ///
    /// # Errors
    ///
    /// Returns the transport (or JSON backend) error only when it struck
    /// before anything was decoded. Otherwise the partial response is
    /// returned with an [`Aborted`](crate::StreamOutcome::Aborted) outcome.
    pub async fn collect(self) -> Result<Response, LlmError> {
        self.for_each_event(|_| {}).await
    }

    /// Drains the stream, calling `f` for each event, and returns the
    /// final response.
    ///
    /// # Errors
    ///
    /// Same as [`collect`](Self::collect).
    pub async fn for_each_event<F>(mut self, mut f: F) -> Result<Response, LlmError>
    where
        F: FnMut(&StreamEvent),
    {
        let mut failure = None;
        while let Some(item) = self.next().await {
            match item {
                Ok(event) => f(&event),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(err) if self.dispatcher.accumulator().is_empty() => Err(err),
            _ => Ok(self.into_response()),
        }
    }

    /// Stops reading and returns what has been accumulated.
    ///
    /// If the stream had not ended yet it is marked aborted.
    pub fn into_response(mut self) -> Response {
        if !self.dispatcher.accumulator().is_terminal() {
            self.dispatcher.abort("stream not fully consumed");
        }
        self.close();
        let json = Arc::clone(self.dispatcher.json());
        Response::from_accumulator(self.dispatcher.into_accumulator(), json.as_ref())
    }

    fn apply(&mut self, events: &[Event]) {
        let result = events
            .iter()
            .try_for_each(|event| self.dispatcher.dispatch(event));
        self.pending.extend(self.dispatcher.drain_events());

        match result {
            Err(e) => self.fail(e),
            Ok(()) if self.dispatcher.accumulator().is_terminal() => self.close(),
            Ok(()) => {}
        }
    }

    fn fail(&mut self, err: LlmError) {
        if self.dispatcher.abort(err.to_string()) {
            tracing::warn!(
                dialect = self.dispatcher.dialect(),
                chunks = self.dispatcher.accumulator().chunks_applied(),
                error = %err,
                "stream aborted"
            );
        }
        self.failure = Some(err);
        self.close();
    }

    fn close(&mut self) {
        self.body = None;
        self.parser.release();
    }
}

impl Stream for StreamingResponse {
    type Item = Result<StreamEvent, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if let Some(err) = this.failure.take() {
                return Poll::Ready(Some(Err(err)));
            }
            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };

            match body.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(bytes))) => match this.parser.feed(&bytes) {
                    Ok(events) => this.apply(&events),
                    Err(e) => this.fail(e),
                },
                Poll::Ready(Some(Err(e))) => this.fail(e),
                Poll::Ready(None) => {
                    let events = this.parser.finish();
                    this.apply(&events);
                    this.close();
                }
            }
        }
    }
}
