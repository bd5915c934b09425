//! The per-dialect decoding seam.
//!
//! Each provider crate implements [`StreamDecoder`] once. The provider
//! picks its decoder when it builds a [`StreamingResponse`](crate::StreamingResponse),
//! so dialect selection happens at construction and never per chunk.
//!
//! ```rust
//! use llm_conduit::{ResponseAccumulator, StreamDecoder};
//! use serde_json::Value;
//!
//! /// Decodes `{"i": 0, "text": "..."}` lines.
//! struct Toy;
//!
//! impl StreamDecoder for Toy {
//!     fn dialect(&self) -> &'static str {
//!         "toy"
//!     }
//!
//!     fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator) {
//!         if let Some(text) = chunk["text"].as_str() {
//!             acc.append_text(0, text);
//!         }
//!     }
//! }
//! ```
//!
//! Dialect chunk types mark their fields with [`lenient`] (and sequences
//! with [`lenient_seq`]) so that one field of an unexpected type drops
//! only that field, not the whole chunk:
//!
//! ```rust
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Chunk {
//!     #[serde(default, deserialize_with = "llm_conduit::decoder::lenient")]
//!     text: Option<String>,
//!     #[serde(default, deserialize_with = "llm_conduit::decoder::lenient")]
//!     usage: Option<u64>,
//! }
//!
//! let chunk: Chunk = serde_json::from_str(r#"{"text": "hi", "usage": "n/a"}"#).unwrap();
//! assert_eq!(chunk.text.as_deref(), Some("hi"));
//! assert_eq!(chunk.usage, None);
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::accumulator::ResponseAccumulator;
use crate::sse::ParserConfig;

/// Applies decoded chunks of one provider dialect to an accumulator.
///
/// Implementations must not fail on chunk shapes they do not recognize:
/// unknown fields are ignored, and a chunk with nothing recognizable is
/// a no-op. Decoding is pure data transformation with no I/O.
pub trait StreamDecoder: Send {
    /// Short dialect name, used in logs.
    fn dialect(&self) -> &'static str;

    /// Framing and sentinel this dialect's wire format uses.
    fn parser_config(&self) -> ParserConfig {
        ParserConfig::default()
    }

    /// `true` when every finished stream of this dialect ends with an
    /// explicit marker (a sentinel or a terminal chunk). A clean close
    /// before that marker is then reported as
    /// [`Unterminated`](crate::StreamOutcome::Unterminated).
    fn requires_terminator(&self) -> bool {
        false
    }

    /// Applies one decoded chunk.
    fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator);
}

/// Deserializes one field, falling back to `T::default()` when the value
/// has an unexpected shape.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring malformed chunk field");
        T::default()
    }))
}

/// Deserializes a sequence, dropping the elements that do not fit `T`.
///
/// A value that is not an array reads as empty.
pub fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            tracing::debug!(value = %other, "Ignoring non-array chunk field");
            return Ok(Vec::new());
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| {
            serde_json::from_value(item)
                .map_err(|e| tracing::debug!(error = %e, "Ignoring malformed chunk element"))
                .ok()
        })
        .collect())
}

impl<D: StreamDecoder + ?Sized> StreamDecoder for Box<D> {
    fn dialect(&self) -> &'static str {
        (**self).dialect()
    }

    fn parser_config(&self) -> ParserConfig {
        (**self).parser_config()
    }

    fn requires_terminator(&self) -> bool {
        (**self).requires_terminator()
    }

    fn decode(&mut self, chunk: Value, acc: &mut ResponseAccumulator) {
        (**self).decode(chunk, acc);
    }
}
