//! Routes parsed events to a dialect decoder.
//!
//! The dispatcher owns the decoder, the JSON backend and the
//! accumulator of one stream. Its only policy decision is which JSON
//! failures are recoverable: a syntax error (including truncated input)
//! drops that one frame, while any other backend failure is surfaced.

use std::fmt;
use std::sync::Arc;

use crate::accumulator::ResponseAccumulator;
use crate::decoder::StreamDecoder;
use crate::error::LlmError;
use crate::json::JsonBackend;
use crate::sse::{Event, Framing};
use crate::stream::StreamEvent;

/// Bridges [`Event`]s to a [`StreamDecoder`].
pub struct Dispatcher {
    decoder: Box<dyn StreamDecoder>,
    json: Arc<dyn JsonBackend>,
    framing: Framing,
    accumulator: ResponseAccumulator,
    skipped: usize,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("dialect", &self.decoder.dialect())
            .field("framing", &self.framing)
            .field("state", &self.accumulator.state())
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with a fresh accumulator.
    pub fn new(decoder: Box<dyn StreamDecoder>, json: Arc<dyn JsonBackend>) -> Self {
        let framing = decoder.parser_config().framing;
        Self {
            decoder,
            json,
            framing,
            accumulator: ResponseAccumulator::new(),
            skipped: 0,
        }
    }

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ResponseFormat`] when the JSON backend fails
    /// for a reason other than malformed input.
    pub fn dispatch(&mut self, event: &Event) -> Result<(), LlmError> {
        if self.accumulator.is_terminal() {
            return Ok(());
        }

        if !event.end {
            let payload = match self.framing {
                Framing::Sse => event.value.as_deref(),
                Framing::Lines => event.chunk.as_deref(),
            };
            if let Some(payload) = payload.filter(|p| !p.trim().is_empty()) {
                self.decode_payload(payload)?;
            }
            return Ok(());
        }

        if event.is_close() && self.decoder.requires_terminator() {
            if self.accumulator.complete_unterminated() {
                tracing::warn!(
                    dialect = self.decoder.dialect(),
                    chunks = self.accumulator.chunks_applied(),
                    "stream closed before its end marker"
                );
            }
        } else if self.accumulator.complete() {
            tracing::debug!(
                dialect = self.decoder.dialect(),
                chunks = self.accumulator.chunks_applied(),
                skipped = self.skipped,
                "stream completed"
            );
        }
        Ok(())
    }

    fn decode_payload(&mut self, payload: &str) -> Result<(), LlmError> {
        match self.json.parse(payload) {
            Ok(chunk) => {
                self.decoder.decode(chunk, &mut self.accumulator);
                self.accumulator.record_chunk();
                Ok(())
            }
            Err(e) if e.is_syntax() => {
                self.skipped += 1;
                tracing::debug!(
                    dialect = self.decoder.dialect(),
                    error = %e,
                    "skipping malformed stream frame"
                );
                Ok(())
            }
            Err(e) => Err(LlmError::ResponseFormat {
                message: e.to_string(),
                raw: payload.to_owned(),
            }),
        }
    }

    /// Aborts the stream, keeping the partial body.
    ///
    /// Returns `false` if the stream had already ended.
    pub fn abort(&mut self, reason: impl Into<String>) -> bool {
        self.accumulator.abort(reason)
    }

    /// Number of frames dropped as malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// The decoder's dialect name.
    pub fn dialect(&self) -> &'static str {
        self.decoder.dialect()
    }

    /// The JSON backend this dispatcher parses with.
    pub fn json(&self) -> &Arc<dyn JsonBackend> {
        &self.json
    }

    /// The accumulator being written to.
    pub fn accumulator(&self) -> &ResponseAccumulator {
        &self.accumulator
    }

    /// Takes the normalized events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<StreamEvent> {
        self.accumulator.drain_events()
    }

    /// Consumes the dispatcher, returning the accumulator.
    pub fn into_accumulator(self) -> ResponseAccumulator {
        self.accumulator
    }
}
