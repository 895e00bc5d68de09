use tracing::debug;

use crate::message::Message;

/// Rough characters-per-token ratio used for budgeting.
const CHARS_PER_TOKEN: usize = 4;
/// Share of the budget available to messages; the rest covers formatting and
/// system overhead.
const HEADROOM_PERCENT: usize = 80;

/// Approximate token count of one message.
pub fn approx_tokens(message: &Message) -> usize {
    message.content().chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Fits a conversation history under an approximate token budget by dropping
/// the oldest messages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContextWindow {
    token_budget: usize,
}

impl ContextWindow {
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Tokens available to messages after headroom.
    pub fn effective_budget(&self) -> usize {
        self.token_budget / 100 * HEADROOM_PERCENT
            + self.token_budget % 100 * HEADROOM_PERCENT / 100
    }

    /// Returns the longest suffix of `messages` that fits the budget.
    ///
    /// A non-empty history always yields at least its newest message, even
    /// when that message alone is over budget.
    pub fn fit<'a>(&self, messages: &'a [Message]) -> &'a [Message] {
        let budget = self.effective_budget();
        let mut total: usize = messages.iter().map(approx_tokens).sum();
        let mut start = 0;
        while total > budget && messages.len() - start > 1 {
            total -= approx_tokens(&messages[start]);
            start += 1;
        }
        if start > 0 {
            debug!(
                event = "context.trimmed",
                domain = "context",
                dropped = start as u64,
                kept = (messages.len() - start) as u64,
                approx_tokens = total as u64,
                budget = budget as u64
            );
        }
        &messages[start..]
    }
}
