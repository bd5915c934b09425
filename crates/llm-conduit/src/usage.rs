//! Token usage reported by a provider.
//!
//! Every provider dialect reports *cumulative* counters: a later usage
//! block supersedes an earlier one rather than adding to it. The
//! accumulator therefore overwrites [`Usage`] instead of summing it.
//! [`Add`] is still provided for callers aggregating across requests.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token counts for a single request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt (messages + system + tool defs).
    pub input_tokens: u64,
    /// Tokens produced by the model's response.
    pub output_tokens: u64,
    /// Total billed tokens. Provider-reported when available, otherwise
    /// `input_tokens + output_tokens`.
    pub total_tokens: u64,
    /// Tokens used for chain-of-thought reasoning, if reported.
    pub reasoning_tokens: Option<u64>,
    /// Tokens served from the provider's prompt cache.
    pub cache_read_tokens: Option<u64>,
    /// Tokens written into the provider's prompt cache.
    pub cache_write_tokens: Option<u64>,
}

impl Usage {
    /// Creates a usage record whose total is `input + output`.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            ..Self::default()
        }
    }

    /// Replaces the computed total with a provider-reported one.
    #[must_use]
    pub fn with_total(mut self, total: Option<u64>) -> Self {
        if let Some(total) = total {
            self.total_tokens = total;
        }
        self
    }

    /// Recomputes `total_tokens` from the input and output counters.
    pub fn recompute_total(&mut self) {
        self.total_tokens = self.input_tokens.saturating_add(self.output_tokens);
    }

    /// `true` when every counter is zero.
    pub fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.total_tokens == 0
    }
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.saturating_add(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += &rhs;
        self
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self += &rhs;
    }
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, rhs: &Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
        self.reasoning_tokens = add_optional(self.reasoning_tokens, rhs.reasoning_tokens);
        self.cache_read_tokens = add_optional(self.cache_read_tokens, rhs.cache_read_tokens);
        self.cache_write_tokens = add_optional(self.cache_write_tokens, rhs.cache_write_tokens);
    }
}
