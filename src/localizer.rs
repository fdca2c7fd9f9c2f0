//! # Localizer
//! Rewrites the messages of a [LocalizedPrompt] for the requesting user.
//!
//! Localization is a fixed sequence of rewrites, each implementing [RewritePrompt]:
//!
//! 1. [LocaleDirective]: append an instruction to answer in the user's language to the first message.
//! 2. [LanguageToken]: replace `%LANGUAGE%` in the first message with the language name.
//! 3. [TemporalContext]: replace `{{temporal_context}}` in the first message and resolve date placeholders in every
//!    message.
//!
//! The order matters: later rewrites may act on text inserted by earlier ones. Every rewrite is skipped when its
//! precondition does not hold, and missing locale metadata only ever skips a rewrite.

use chrono::{DateTime, Utc};
use crate::locale::{lookup_language, resolve_locale, LanguageName, LocaleMetadata, User};
use crate::prompt::LocalizedPrompt;
use crate::utils::prompt_processing::{replace_placeholder, Placeholder};
use crate::utils::timing::{local_date, replace_date_placeholders, temporal_context, Clock};

/// Locale of the language the prompt templates are written in.
pub const TEMPLATE_LOCALE: &str = "en";

/// Everything a rewrite may look at, resolved once per request.
#[derive(Debug, Clone)]
pub struct LocalizationContext<'a> {
    pub user: Option<&'a User>,
    /// The resolved locale code.
    pub locale: &'a str,
    /// Names of the resolved locale, `None` when the metadata store does not know it.
    pub language: Option<LanguageName>,
    pub now: DateTime<Utc>,
}

impl LocalizationContext<'_> {
    /// The instruction asking the model to answer in the resolved language, if one is needed.
    pub fn locale_instructions(&self) -> Option<String> {
        if self.locale == TEMPLATE_LOCALE {
            return None;
        }
        self.language.as_ref().map(|language| {
            let description = format!("{} ({})", language.name, language.native_name);
            format!("It is imperative that you write your answer in {description}, you are interacting with a \
            {description} speaking user. Leave tag names in English.")
        })
    }
}

/// One step of localization. Mutates the prompt in place.
pub trait RewritePrompt {
    fn rewrite(&self, prompt: &mut LocalizedPrompt, context: &LocalizationContext);
}

pub struct LocaleDirective;

impl RewritePrompt for LocaleDirective {
    fn rewrite(&self, prompt: &mut LocalizedPrompt, context: &LocalizationContext) {
        let instructions = match context.locale_instructions() {
            Some(instructions) => instructions,
            None => return,
        };
        if let Some(first) = prompt.first_content_mut() {
            // applied once, even when localizing an already localized prompt
            if !first.contains(&instructions) {
                if !first.is_empty() && !first.ends_with(char::is_whitespace) {
                    first.push(' ');
                }
                first.push_str(&instructions);
            }
        }
    }
}

pub struct LanguageToken;

impl RewritePrompt for LanguageToken {
    fn rewrite(&self, prompt: &mut LocalizedPrompt, context: &LocalizationContext) {
        if let (Some(first), Some(language)) = (prompt.first_content_mut(), context.language.as_ref()) {
            replace_placeholder(first, Placeholder::Language, &language.name);
        }
    }
}

pub struct TemporalContext;

impl RewritePrompt for TemporalContext {
    fn rewrite(&self, prompt: &mut LocalizedPrompt, context: &LocalizationContext) {
        let user = match context.user {
            Some(user) => user,
            None => return,
        };
        if !prompt.messages.iter().any(|m| Placeholder::TemporalContext.is_in(&m.content)) {
            return;
        }
        let timezone = user.timezone.as_deref();
        if let Some(first) = prompt.first_content_mut() {
            replace_placeholder(first, Placeholder::TemporalContext, &temporal_context(context.now, timezone));
        }
        let today = local_date(context.now, timezone);
        for message in prompt.messages_mut() {
            if Placeholder::Date.is_in(&message.content) {
                message.content = replace_date_placeholders(&message.content, today);
            }
        }
    }
}

/// The rewrites in the order they are applied.
pub const REWRITES: [&(dyn RewritePrompt + Sync); 3] = [&LocaleDirective, &LanguageToken, &TemporalContext];

/// Localizes prompts against a locale metadata store and a clock.
pub struct Localizer<'a> {
    pub metadata: &'a dyn LocaleMetadata,
    pub clock: &'a dyn Clock,
    pub default_locale: &'a str,
}

impl<'a> Localizer<'a> {
    pub fn context<'c>(&self, user: Option<&'c User>, force_default_locale: bool) -> LocalizationContext<'c>
        where 'a: 'c {
        let locale = resolve_locale(user, force_default_locale, self.default_locale);
        LocalizationContext {
            user,
            locale,
            language: lookup_language(self.metadata, locale).ok(),
            now: self.clock.now(),
        }
    }

    /// Apply every rewrite in order.
    pub fn localize(&self, prompt: &mut LocalizedPrompt, user: Option<&User>, force_default_locale: bool) {
        let context = self.context(user, force_default_locale);
        for rewrite in REWRITES {
            rewrite.rewrite(prompt, &context);
        }
    }

    pub fn locale_instructions(&self, user: Option<&User>, force_default_locale: bool) -> Option<String> {
        self.context(user, force_default_locale).locale_instructions()
    }
}
