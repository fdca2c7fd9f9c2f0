//! # promptcraft
//!
//! Prompt generation and streaming-diff orchestration for AI writing helpers
//!
//! **Note: `promptcraft` is a WIP, so the APIs are subject to change.**
//!
//! ## What it does
//!
//! End users pick a pre-defined transformation ("translate", "proofread", "summarize" and so on), apply it to some
//! text, and either wait for the result or watch it being written. `promptcraft` sits between the UI and the language
//! model:
//!
//! * it lists the prompts a user can pick from, translated and cached per site and locale,
//! * it localizes the prompt for the user (answer language, current time, relative dates),
//! * it sends the prompt to a completion backend, in one shot or streamed,
//! * it removes the wrapper tags the model was told to emit, splits list answers and diffs rewrites against the input,
//! * it publishes throttled partial results of a stream, followed by exactly one final result.
//!
//! ## Concepts and Design
//!
//! The design is data-driven and as flat as possible. Collaborators are traits with in-memory implementations, so
//! every step can be followed (and tested) without a network.
//!
//! ### Prompt definition and localized prompt
//!
//! A [`PromptDefinition`](crate::prompt::PromptDefinition) is owned by the catalog and never mutated. Applying it to
//! an input produces a request-owned [`LocalizedPrompt`](crate::prompt::LocalizedPrompt), which is then rewritten in
//! place by the [`Localizer`](crate::localizer::Localizer).
//!
//! A template may contain these placeholders:
//!
//! ```text
//! Translate the text to %LANGUAGE%.
//! The time is {{temporal_context}}. Next week starts on {{date:+7d}}.
//! ```
//!
//! The set is closed and substituted in a fixed order, see [`localizer`](crate::localizer).
//!
//! ### Prompt type
//!
//! Every prompt is [`Simple`](crate::prompt::PromptType::Simple), [`List`](crate::prompt::PromptType::List) or
//! [`Diff`](crate::prompt::PromptType::Diff), which selects how its output is post-processed.
//!
//! ### Streaming
//!
//! A streamed completion is folded into a [`StreamState`](crate::streaming::StreamState). Partial results are flushed
//! to a [`PublishSink`](crate::streaming::PublishSink) when enough text and time have accumulated. Visible results
//! only ever grow, and at most one final result is published per request.
//!
//! ### Collaborators
//!
//! * [`CompletionBackend`](crate::backend::CompletionBackend): the language model. An OpenAI implementation is
//!   available with the `openai` feature.
//! * [`CatalogStore`](crate::catalog::CatalogStore): where prompt definitions live.
//! * [`LocaleMetadata`](crate::locale::LocaleMetadata) and [`Translations`](crate::catalog::Translations): language
//!   names and UI strings.
//! * [`PublishSink`](crate::streaming::PublishSink): the channel viewers listen on. A terminal renderer is available
//!   with the `terminal_printing` feature.
//!
//! Everything is tied together by [`Assistant`](crate::assistant::Assistant).
//!
//! ## License
//!
//! `promptcraft` will always remain free under Apache license.
//!
//! ## Attribution
//! * `tiktoken-rs`: In [crate::utils::token], completion lengths are clamped with `tiktoken-rs` tokenizers.
//!

pub mod prompt;
pub mod errors;
pub mod config;
pub mod locale;
pub mod localizer;
pub mod catalog;
pub mod backend;
pub mod streaming;
pub mod assistant;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
