//! # Prompt
//! A prompt is an instruction template paired with a post-processing type.
//!
//! ## PromptDefinition
//! A prompt definition is owned by the catalog and is never mutated by this crate. It holds an ordered list of
//! messages (system instructions, then example exchanges), generation parameters and a [PromptType].
//!
//! ## LocalizedPrompt
//! A localized prompt is a fresh copy of the messages of a definition with the user input appended. It can be only
//! constructed via [PromptDefinition::messages_with_input] (or [LocalizedPrompt::new] for one-off prompts such as image
//! captions), belongs to exactly one request and is rewritten in place by the [localizer](crate::localizer).
//!
//! ### Prompt types
//! * [PromptType::Simple]: the output is shown as-is after sanitization.
//! * [PromptType::List]: the output is a list of `<item>` elements, each shown as a separate suggestion.
//! * [PromptType::Diff]: the output replaces the input, and an inline diff against the input is attached.

use std::fmt;
use log::warn;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::errors::AssistError;

/// Name of the prompt whose instruction is supplied by the caller.
pub const CUSTOM_PROMPT: &str = "custom_prompt";

/// Identifier of a prompt definition in the catalog.
pub type PromptId = i64;

/// Classification of a prompt controlling how its output is post-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    Simple,
    List,
    Diff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message. User messages may carry an image for vision-capable backends.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub image: Option<Url>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image: None,
        }
    }

    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach an image to this message.
    pub fn with_image(mut self, image: Url) -> Self {
        self.image = Some(image);
        self
    }
}

/// How a caller refers to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRef {
    Id(PromptId),
    Name(String),
}

impl PromptRef {
    pub fn matches(&self, definition: &PromptDefinition) -> bool {
        match self {
            PromptRef::Id(id) => definition.id == *id,
            PromptRef::Name(name) => definition.name == *name,
        }
    }
}

impl fmt::Display for PromptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptRef::Id(id) => write!(f, "prompt id {}", id),
            PromptRef::Name(name) => write!(f, "prompt {:?}", name),
        }
    }
}

/// A prompt as stored in the catalog, read-only for this crate.
#[derive(Debug, Clone)]
#[readonly::make]
pub struct PromptDefinition {
    #[readonly]
    pub id: PromptId,
    #[readonly]
    pub name: String,
    /// Display name stored alongside the definition, used when no translation exists.
    #[readonly]
    pub translated_name: Option<String>,
    #[readonly]
    pub prompt_type: PromptType,
    #[readonly]
    pub messages: Vec<Message>,
    #[readonly]
    pub temperature: Option<f32>,
    #[readonly]
    pub stop_sequences: Vec<String>,
    #[readonly]
    pub enabled: bool,
}

impl PromptDefinition {
    /// Create an enabled prompt definition with default generation parameters. Warns if there are no messages.
    pub fn new(id: PromptId, name: impl Into<String>, prompt_type: PromptType, messages: Vec<Message>) -> Self {
        let name = name.into();
        if messages.is_empty() {
            warn!("Prompt definition {} ({}) has no messages. The model will only see the user input.", name, id);
        }
        Self {
            id,
            name,
            translated_name: None,
            prompt_type,
            messages,
            temperature: None,
            stop_sequences: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_translated_name(mut self, translated_name: impl Into<String>) -> Self {
        self.translated_name = Some(translated_name.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Copy the template messages and append the user input as the last user message.
    ///
    /// The `custom_prompt` definition requires `custom_instruction`, which is prefixed to the input.
    /// Other definitions ignore it.
    pub fn messages_with_input(&self, input: &str, custom_instruction: Option<&str>) -> Result<LocalizedPrompt, AssistError> {
        let user_input = if self.name == CUSTOM_PROMPT {
            match custom_instruction.map(str::trim).filter(|s| !s.is_empty()) {
                Some(instruction) => format!("{}:\n<input>{}</input>", instruction, input),
                None => return Err(AssistError::InvalidCatalogEntry(
                    format!("{} requires a custom instruction", CUSTOM_PROMPT))),
            }
        } else {
            format!("<input>{}</input>", input)
        };
        let mut messages = self.messages.clone();
        messages.push(Message::user(user_input));
        Ok(LocalizedPrompt::new(messages))
    }
}

/// A request-owned copy of prompt messages, rewritten in place by the localizer.
#[derive(Debug, Clone, PartialEq)]
#[readonly::make]
pub struct LocalizedPrompt {
    #[readonly]
    pub messages: Vec<Message>,
}

impl LocalizedPrompt {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Content of the first message, or an empty string when there is none.
    pub fn first_content(&self) -> &str {
        self.messages.first().map_or("", |m| m.content.as_str())
    }

    pub(crate) fn first_content_mut(&mut self) -> Option<&mut String> {
        self.messages.first_mut().map(|m| &mut m.content)
    }

    pub(crate) fn messages_mut(&mut self) -> &mut Vec<Message> {
        &mut self.messages
    }
}

/// Parameters sent to the completion backend with a prompt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub max_tokens: Option<u32>,
    /// Tag identifying the calling feature, for backend-side accounting.
    pub feature_name: String,
    pub user_id: Option<u64>,
}
