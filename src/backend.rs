//! # Completion backend
//! The language model is a black box behind [CompletionBackend]. A backend either answers with the whole text at once
//! or with a stream of fragments, strictly in order.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use crate::errors::AssistError;
use crate::prompt::{GenerationParams, LocalizedPrompt};

#[cfg(feature = "openai")]
pub mod openai;

/// Fragments of a streamed completion. An `Err` item ends the stream.
pub type FragmentStream = BoxStream<'static, Result<String, AssistError>>;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate the full completion for `prompt`.
    async fn complete(&self, prompt: &LocalizedPrompt, params: &GenerationParams) -> Result<String, AssistError>;

    /// Start a streamed completion for `prompt`.
    ///
    /// Implementations should stop producing (and release backend resources) once `cancel` fires.
    async fn stream(&self,
                    prompt: &LocalizedPrompt,
                    params: &GenerationParams,
                    cancel: CancellationToken) -> Result<FragmentStream, AssistError>;
}
