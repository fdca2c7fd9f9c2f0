//! Token counting traits and utilities

use crate::prompt::LocalizedPrompt;

#[cfg(feature = "openai")]
pub mod tiktoken;

/// Fixed overhead the chat format adds to every message.
pub const TOKENS_PER_MESSAGE: usize = 3;
/// Every reply is primed with this many tokens.
pub const TOKENS_PER_REPLY: usize = 3;

/// Trait for counting tokens in a string.
pub trait CountToken {
    fn count_token(&self, string: &str) -> usize;
}

/// Blanket impl of CountToken for Fn(&str) -> usize.
impl<F> CountToken for F where F: Fn(&str) -> usize {
    fn count_token(&self, string: &str) -> usize {
        self(string)
    }
}

/// Count the tokens a chat prompt occupies, including per-message overhead. Images are not counted.
pub fn count_prompt_tokens(prompt: &LocalizedPrompt, counter: &impl CountToken) -> usize {
    let messages: usize = prompt.messages
        .iter()
        .map(|msg| counter.count_token(&msg.content) + TOKENS_PER_MESSAGE)
        .sum();
    messages + TOKENS_PER_REPLY
}

/// Largest completion budget that still fits in `context_window`, capped at `requested`.
pub fn completion_budget(prompt_tokens: usize, context_window: usize, requested: usize) -> usize {
    context_window.saturating_sub(prompt_tokens).min(requested)
}
