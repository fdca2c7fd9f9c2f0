use std::time::Duration;
use async_openai::config::OpenAIConfig;
use async_openai::error::{ApiError, OpenAIError};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPart,
    ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageUrlArgs, Stop,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use futures::StreamExt;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::backend::{CompletionBackend, FragmentStream};
use crate::errors::AssistError;
use crate::prompt::{GenerationParams, LocalizedPrompt, Message, Role};
use crate::utils::token::tiktoken::Tiktoken;

/// Chat-completion backend for the OpenAI API.
#[derive(Clone)]
pub struct OpenAIBackend {
    pub client: Client<OpenAIConfig>,
    pub model: String,
    counter: Option<Tiktoken>,
}

impl OpenAIBackend {
    /// Create a backend for `model`. Completion lengths are clamped to the context window when the model has a known
    /// tokenizer.
    ///
    /// The client's own retry policy is replaced by [no_retry_backoff], so rate limits surface as
    /// [AssistError::RateLimited] and retrying is left to the caller.
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        let client = client.with_backoff(no_retry_backoff());
        let model = model.into();
        let counter = match Tiktoken::new(model.as_str()) {
            Ok(counter) => Some(counter),
            Err(err) => {
                debug!("not clamping completion length for {}: {}", model, err);
                None
            }
        };
        Self { client, model, counter }
    }

    fn request(&self, prompt: &LocalizedPrompt, params: &GenerationParams) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let messages = prompt.messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.as_str()).messages(messages);
        if let Some(temperature) = params.temperature {
            args.temperature(temperature);
        }
        if !params.stop_sequences.is_empty() {
            args.stop(Stop::StringArray(params.stop_sequences.clone()));
        }
        if let Some(requested) = params.max_tokens {
            let requested = requested as usize;
            let budget = self.counter.as_ref().map_or(requested, |c| c.clamp_completion(prompt, requested));
            args.max_tokens(u16::try_from(budget).unwrap_or(u16::MAX));
        }
        if let Some(user_id) = params.user_id {
            args.user(user_id.to_string());
        }
        debug!("{} request to {} with {} messages", params.feature_name, self.model, prompt.messages.len());
        args.build()
    }
}

/// A backoff policy that gives up after the first failed attempt.
pub fn no_retry_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..ExponentialBackoff::default()
    }
}

fn to_request_message(msg: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let request_message = match (msg.role, &msg.image) {
        (Role::System, _) => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default().content(msg.content.as_str()).build()?),
        (Role::Assistant, _) => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default().content(msg.content.as_str()).build()?),
        (Role::User, None) => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Text(msg.content.clone()))
                .build()?),
        (Role::User, Some(image)) => {
            let parts = vec![
                ChatCompletionRequestMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartTextArgs::default().text(msg.content.as_str()).build()?),
                ChatCompletionRequestMessageContentPart::Image(
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(ImageUrlArgs::default().url(image.as_str()).build()?)
                        .build()?),
            ];
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(parts))
                    .build()?)
        }
    };
    Ok(request_message)
}

fn is_rate_limit(err: &ApiError) -> bool {
    let type_says_so = err.r#type.as_deref().map_or(false, |t| t.contains("rate_limit") || t == "requests" || t == "tokens");
    type_says_so || err.message.to_ascii_lowercase().contains("rate limit")
}

fn map_openai_error(err: OpenAIError) -> AssistError {
    match err {
        OpenAIError::ApiError(api) if is_rate_limit(&api) => AssistError::RateLimited { message: api.message },
        other => AssistError::BackendUnavailable(other.to_string()),
    }
}

#[async_trait]
impl CompletionBackend for OpenAIBackend {
    async fn complete(&self, prompt: &LocalizedPrompt, params: &GenerationParams) -> Result<String, AssistError> {
        let request = self.request(prompt, params).map_err(map_openai_error)?;
        let response = self.client.chat().create(request).await.map_err(map_openai_error)?;
        let text = response.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(text)
    }

    async fn stream(&self,
                    prompt: &LocalizedPrompt,
                    params: &GenerationParams,
                    cancel: CancellationToken) -> Result<FragmentStream, AssistError> {
        let request = self.request(prompt, params).map_err(map_openai_error)?;
        let chunks = self.client.chat().create_stream(request).await.map_err(map_openai_error)?;
        let fragments = chunks
            .take_until(async move { cancel.cancelled().await })
            .filter_map(|chunk| async move {
                match chunk {
                    Ok(response) => {
                        let text: String = response.choices
                            .into_iter()
                            .filter_map(|choice| choice.delta.content)
                            .collect();
                        (!text.is_empty()).then_some(Ok(text))
                    }
                    Err(err) => {
                        warn!("completion stream failed: {}", err);
                        Some(Err(map_openai_error(err)))
                    }
                }
            })
            .boxed();
        Ok(fragments)
    }
}
