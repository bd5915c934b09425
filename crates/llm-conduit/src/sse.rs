//! Incremental Server-Sent Events parser.
//!
//! [`EventParser`] turns raw body bytes into [`Event`]s without any
//! knowledge of the provider behind them. It handles:
//!
//! - UTF-8 sequences split across network chunks,
//! - `\n` and `\r\n` line endings,
//! - multi-line `data:` fields (newline-joined),
//! - comment lines (`: keep-alive`) and unknown fields, which are ignored,
//! - an optional end sentinel (`[DONE]` by default),
//! - a plain-chunk mode ([`Framing::Lines`]) for newline-delimited JSON.
//!
//! The sequence of events is identical however the bytes were split
//! before reaching [`feed`](EventParser::feed).
//!
//! ```rust
//! use llm_conduit::sse::{EventParser, ParserConfig};
//!
//! let mut parser = EventParser::new(ParserConfig::default());
//! let mut events = parser.feed(b"data: {\"a\":1}\n\nda").unwrap();
//! events.extend(parser.feed(b"ta: [DONE]\n\n").unwrap());
//!
//! assert_eq!(events[0].value.as_deref(), Some("{\"a\":1}"));
//! assert!(events[1].end);
//! ```

use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use crate::error::LlmError;
use crate::stream::ByteStream;

/// The end-of-stream payload used by `OpenAI`-compatible APIs.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Default cap on an unterminated line or record.
const MAX_BUF: usize = 16 * 1024 * 1024; // 16 MiB

/// How records are delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `event:` / `data:` fields, records separated by a blank line.
    #[default]
    Sse,
    /// One bare payload per line (newline-delimited JSON).
    Lines,
}

/// Parser settings, chosen per provider dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// How records are delimited.
    pub framing: Framing,
    /// A payload that marks the end of the stream, if the dialect has one.
    pub end_sentinel: Option<String>,
    /// Maximum bytes buffered for a single unterminated line or record.
    pub max_buffer: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            framing: Framing::Sse,
            end_sentinel: Some(DONE_SENTINEL.into()),
            max_buffer: MAX_BUF,
        }
    }
}

impl ParserConfig {
    /// SSE framing with the `[DONE]` sentinel.
    pub fn sse() -> Self {
        Self::default()
    }

    /// Newline-delimited framing with no sentinel.
    pub fn lines() -> Self {
        Self {
            framing: Framing::Lines,
            end_sentinel: None,
            ..Self::default()
        }
    }

    /// Disables sentinel detection; only transport close ends the stream.
    #[must_use]
    pub fn without_sentinel(mut self) -> Self {
        self.end_sentinel = None;
        self
    }
}

/// One parsed record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// The `event:` field, if present.
    pub event_type: Option<String>,
    /// The joined `data:` payload. Always `None` in [`Framing::Lines`].
    pub value: Option<String>,
    /// The raw frame (SSE) or line (plain chunk mode) this event came from.
    pub chunk: Option<String>,
    /// Set on the sentinel record, or on the synthetic event emitted when
    /// the transport closes.
    pub end: bool,
}

impl Event {
    fn closed() -> Self {
        Self {
            end: true,
            ..Self::default()
        }
    }

    /// `true` for the synthetic end event of a transport close, as
    /// opposed to a sentinel record.
    pub fn is_close(&self) -> bool {
        self.end && self.value.is_none() && self.chunk.is_none()
    }
}

/// Incremental parser from bytes to [`Event`]s.
///
/// Feed it with [`feed`](Self::feed) as chunks arrive and call
/// [`finish`](Self::finish) when the transport closes. Buffers are freed
/// exactly once, by [`finish`](Self::finish), an explicit
/// [`release`](Self::release), a buffer overflow, or `Drop`, whichever
/// comes first.
#[derive(Debug)]
pub struct EventParser {
    config: ParserConfig,
    utf8_buf: Vec<u8>,
    text_buf: String,
    event_type: Option<String>,
    data: Option<String>,
    raw: String,
    ended: bool,
    released: bool,
}

impl EventParser {
    /// Creates a parser with empty buffers.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            utf8_buf: Vec::new(),
            text_buf: String::new(),
            event_type: None,
            data: None,
            raw: String::new(),
            ended: false,
            released: false,
        }
    }

    /// The configuration this parser was built with.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// `true` once an `end` event has been emitted.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// `true` once the internal buffers have been freed.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Consumes one chunk of body bytes and returns every event it completed.
    ///
    /// Input after the end event, or after release, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ResponseFormat`] when a single line or record
    /// grows beyond [`ParserConfig::max_buffer`]. The parser is released.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Event>, LlmError> {
        if self.ended || self.released {
            return Ok(Vec::new());
        }

        self.utf8_buf.extend_from_slice(bytes);
        self.decode_utf8();
        let events = self.drain_lines();

        let pending = self.text_buf.len() + self.raw.len();
        if pending > self.config.max_buffer {
            let limit = self.config.max_buffer;
            self.release();
            return Err(LlmError::ResponseFormat {
                message: format!("stream buffer exceeded {limit} bytes without a record boundary"),
                raw: String::new(),
            });
        }

        Ok(events)
    }

    /// Signals that the transport closed.
    ///
    /// Flushes a trailing record that was not followed by a blank line,
    /// then emits a final `end` event unless the sentinel was already
    /// seen. Releases the buffers.
    pub fn finish(&mut self) -> Vec<Event> {
        if self.released {
            return Vec::new();
        }

        let mut events = Vec::new();
        if !self.ended {
            if !self.utf8_buf.is_empty() {
                let tail = String::from_utf8_lossy(&self.utf8_buf).into_owned();
                self.text_buf.push_str(&tail);
                self.utf8_buf.clear();
            }

            let rest = std::mem::take(&mut self.text_buf);
            let rest = rest.trim_end_matches('\r');
            if !rest.is_empty() {
                events.extend(self.process_line(rest));
            }
            if !self.ended && self.config.framing == Framing::Sse {
                events.extend(self.flush_record());
            }
            if !self.ended {
                self.ended = true;
                events.push(Event::closed());
            }
        }

        self.release();
        events
    }

    /// Frees the internal buffers.
    ///
    /// Idempotent: returns `true` only on the call that actually freed
    /// them. The parser ignores input afterwards.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.utf8_buf = Vec::new();
        self.text_buf = String::new();
        self.raw = String::new();
        self.data = None;
        self.event_type = None;
        tracing::trace!(framing = ?self.config.framing, ended = self.ended, "event parser released");
        true
    }

    /// Moves the longest valid UTF-8 prefix of `utf8_buf` into `text_buf`.
    ///
    /// An incomplete trailing sequence stays buffered for the next chunk.
    /// Invalid sequences become U+FFFD.
    fn decode_utf8(&mut self) {
        loop {
            match std::str::from_utf8(&self.utf8_buf) {
                Ok(text) => {
                    self.text_buf.push_str(text);
                    self.utf8_buf.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.utf8_buf[..valid_up_to]) {
                        self.text_buf.push_str(valid);
                    }
                    if let Some(len) = e.error_len() {
                        self.text_buf.push(char::REPLACEMENT_CHARACTER);
                        self.utf8_buf.drain(..valid_up_to + len);
                    } else {
                        self.utf8_buf.drain(..valid_up_to);
                        return;
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while !self.ended {
            let Some(pos) = self.text_buf.find('\n') else {
                break;
            };
            let line: String = self.text_buf.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            events.extend(self.process_line(line));
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<Event> {
        match self.config.framing {
            Framing::Sse => self.process_sse_line(line),
            Framing::Lines => self.process_plain_line(line),
        }
    }

    fn process_plain_line(&mut self, line: &str) -> Option<Event> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let end = self.is_sentinel(line);
        self.ended = end;
        Some(Event {
            event_type: None,
            value: None,
            chunk: Some(line.to_owned()),
            end,
        })
    }

    fn process_sse_line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            return self.flush_record();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        self.raw.push_str(line);
        self.raw.push('\n');

        match field {
            "event" => self.event_type = Some(value.to_owned()),
            "data" => {
                if let Some(data) = self.data.as_mut() {
                    data.push('\n');
                    data.push_str(value);
                } else {
                    self.data = Some(value.to_owned());
                }
            }
            // id, retry, and anything a vendor adds later
            _ => {}
        }
        None
    }

    fn flush_record(&mut self) -> Option<Event> {
        let raw = std::mem::take(&mut self.raw);
        let event_type = self.event_type.take();
        let data = self.data.take();
        if event_type.is_none() && data.is_none() {
            return None;
        }

        let end = data.as_deref().is_some_and(|d| self.is_sentinel(d));
        self.ended = end;
        Some(Event {
            event_type,
            value: data,
            chunk: Some(raw.trim_end_matches('\n').to_owned()),
            end,
        })
    }

    fn is_sentinel(&self, payload: &str) -> bool {
        self.config
            .end_sentinel
            .as_deref()
            .is_some_and(|sentinel| payload.trim() == sentinel)
    }
}

impl Drop for EventParser {
    fn drop(&mut self) {
        self.release();
    }
}

/// A pinned, boxed, `Send` stream of parsed events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, LlmError>> + Send>>;

/// Lazily parses a byte stream into events.
///
/// The stream ends after the first `end` event or the first error; it
/// cannot be restarted. The parser's buffers are released on every path
/// out, including the consumer dropping the stream early.
pub fn events(body: ByteStream, config: ParserConfig) -> EventStream {
    let stream = body
        .map(Some)
        .chain(stream::once(async { None }))
        .scan(EventParser::new(config), |parser, chunk| {
            let result = if parser.is_ended() || parser.is_released() {
                parser.release();
                None
            } else {
                match chunk {
                    Some(Ok(bytes)) => Some(match parser.feed(&bytes) {
                        Ok(events) => events.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    }),
                    Some(Err(e)) => {
                        parser.release();
                        Some(vec![Err(e)])
                    }
                    None => Some(parser.finish().into_iter().map(Ok).collect::<Vec<_>>()),
                }
            };

            async move { result }
        })
        .flat_map(stream::iter);

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(config: ParserConfig, chunks: &[&[u8]]) -> Vec<Event> {
        let mut parser = EventParser::new(config);
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(parser.feed(chunk).unwrap());
        }
        events.extend(parser.finish());
        events
    }

    const FRAMES: &str = "event: message\ndata: {\"n\":1}\n\n: keep-alive\n\ndata: {\"n\":2}\nid: 7\n\ndata: [DONE]\n\n";

    #[test]
    fn test_single_data_record() {
        let events = parse_all(ParserConfig::default(), &[b"data: {\"a\":1}\n\n"]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value.as_deref(), Some("{\"a\":1}"));
        assert_eq!(events[0].chunk.as_deref(), Some("data: {\"a\":1}"));
        assert!(!events[0].end);
        assert_eq!(events[1], Event::closed());
    }

    #[test]
    fn test_event_field_and_comment() {
        let events = parse_all(ParserConfig::default(), &[FRAMES.as_bytes()]);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type.as_deref(), Some("message"));
        assert_eq!(events[1].event_type, None);
        assert_eq!(events[1].value.as_deref(), Some("{\"n\":2}"));
        assert!(events[2].end);
        assert_eq!(events[2].value.as_deref(), Some("[DONE]"));
    }

    #[test]
    fn test_multiline_data_joined() {
        let events = parse_all(ParserConfig::default(), &[b"data: line one\ndata: line two\n\n"]);
        assert_eq!(events[0].value.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let events = parse_all(
            ParserConfig::default(),
            &[b"retry: 1000\nx-vendor: whatever\ndata: ok\n\n"],
        );
        assert_eq!(events[0].value.as_deref(), Some("ok"));
        assert_eq!(events[0].event_type, None);
    }

    #[test]
    fn test_field_without_space() {
        let events = parse_all(ParserConfig::default(), &[b"data:{\"a\":1}\n\n"]);
        assert_eq!(events[0].value.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let events = parse_all(ParserConfig::default(), &[b"data: {\"a\":1}\r\n\r\n"]);
        assert_eq!(events[0].value.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_event_only_record_has_no_value() {
        let events = parse_all(ParserConfig::default(), &[b"event: ping\n\n"]);
        assert_eq!(events[0].event_type.as_deref(), Some("ping"));
        assert!(events[0].value.is_none());
    }

    #[test]
    fn test_arbitrary_chunk_boundaries_produce_same_events() {
        let whole = parse_all(ParserConfig::default(), &[FRAMES.as_bytes()]);

        let bytes = FRAMES.as_bytes();
        let single: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(parse_all(ParserConfig::default(), &single), whole);

        for size in [2, 3, 5, 7, 13] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            assert_eq!(parse_all(ParserConfig::default(), &chunks), whole, "chunk size {size}");
        }
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let frame = "data: héllo 🌍\n\n".as_bytes();
        let chunks: Vec<&[u8]> = frame.chunks(1).collect();
        let events = parse_all(ParserConfig::default(), &chunks);
        assert_eq!(events[0].value.as_deref(), Some("héllo 🌍"));
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let events = parse_all(ParserConfig::default(), &[b"data: a\xffb\n\n"]);
        assert_eq!(events[0].value.as_deref(), Some("a\u{FFFD}b"));
    }

    #[test]
    fn test_input_after_sentinel_ignored() {
        let events = parse_all(
            ParserConfig::default(),
            &[b"data: [DONE]\n\ndata: {\"late\":true}\n\n"],
        );
        assert_eq!(events.len(), 1);
        assert!(events[0].end);
    }

    #[test]
    fn test_sentinel_disabled() {
        let events = parse_all(
            ParserConfig::default().without_sentinel(),
            &[b"data: [DONE]\n\n"],
        );
        assert_eq!(events.len(), 2);
        assert!(!events[0].end);
        assert!(events[1].end);
    }

    #[test]
    fn test_trailing_record_flushed_on_finish() {
        let events = parse_all(ParserConfig::default(), &[b"data: {\"tail\":1}"]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value.as_deref(), Some("{\"tail\":1}"));
        assert!(events[1].end);
    }

    #[test]
    fn test_empty_input_only_emits_end() {
        let events = parse_all(ParserConfig::default(), &[]);
        assert_eq!(events, vec![Event::closed()]);
    }

    #[test]
    fn test_lines_framing() {
        let events = parse_all(
            ParserConfig::lines(),
            &[b"{\"a\":1}\n\n{\"a\"", b":2}\n{\"a\":3}"],
        );
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].chunk.as_deref(), Some("{\"a\":1}"));
        assert!(events[0].value.is_none());
        assert_eq!(events[1].chunk.as_deref(), Some("{\"a\":2}"));
        assert_eq!(events[2].chunk.as_deref(), Some("{\"a\":3}"));
        assert!(events[3].end);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut parser = EventParser::new(ParserConfig::default());
        parser.feed(b"data: partial").unwrap();
        assert!(parser.release());
        assert!(!parser.release());
        assert!(parser.is_released());
        assert!(parser.feed(b"\n\n").unwrap().is_empty());
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_finish_releases() {
        let mut parser = EventParser::new(ParserConfig::default());
        parser.finish();
        assert!(parser.is_released());
        assert!(!parser.release());
    }

    #[test]
    fn test_buffer_limit() {
        let config = ParserConfig {
            max_buffer: 8,
            ..ParserConfig::default()
        };
        let mut parser = EventParser::new(config);
        let err = parser.feed(b"data: this line never ends").unwrap_err();
        assert!(matches!(err, LlmError::ResponseFormat { .. }));
        assert!(parser.is_released());
    }

    #[tokio::test]
    async fn test_events_stream_stops_at_sentinel() {
        let body: ByteStream = Box::pin(stream::iter(vec![
            Ok(bytes::Bytes::from_static(b"data: 1\n\ndata: [DO")),
            Ok(bytes::Bytes::from_static(b"NE]\n\ndata: 2\n\n")),
        ]));
        let events: Vec<_> = events(body, ParserConfig::default()).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].as_ref().unwrap().end);
    }

    #[tokio::test]
    async fn test_events_stream_surfaces_transport_error() {
        let body: ByteStream = Box::pin(stream::iter(vec![
            Ok(bytes::Bytes::from_static(b"data: 1\n\n")),
            Err(LlmError::transport("connection reset")),
            Ok(bytes::Bytes::from_static(b"data: 2\n\n")),
        ]));
        let events: Vec<_> = events(body, ParserConfig::default()).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(LlmError::Http { .. })));
    }
}
