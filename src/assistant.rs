//! # Assistant
//! The public surface of this crate: prompt listing, one-shot and streamed generation, and image captions.
//!
//! An [Assistant] serves one site. It resolves prompts from a [CatalogStore], localizes them for the requesting
//! user, sends them to a [CompletionBackend] and post-processes the output according to the [PromptType] of the
//! prompt.

use std::sync::Arc;
use log::debug;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;
use crate::backend::CompletionBackend;
use crate::catalog::cache::PromptCatalogCache;
use crate::catalog::{catalog_entry, CatalogEntry, CatalogFilter, CatalogStore, StaticTranslations, Translations,
                     ILLUSTRATE_POST};
use crate::config::AssistantConfig;
use crate::errors::AssistError;
use crate::locale::{resolve_locale, LocaleMetadata, StaticLocaleNames, User};
use crate::localizer::Localizer;
use crate::prompt::{GenerationParams, LocalizedPrompt, Message, PromptDefinition, PromptRef, PromptType};
use crate::streaming::{drive_stream, PublishSink, PublishTarget, StreamContext, StreamOutcome};
use crate::utils::diff::inline_diff;
use crate::utils::postprocess::markup::{parse_list, sanitize, squish_and_truncate_words};
use crate::utils::timing::{Clock, SystemClock};

/// Separator some caption models put between alternatives. Removed from captions.
pub const CAPTION_SEPARATOR: char = '|';

const CAPTION_SYSTEM_PROMPT: &str = "You are a bot specializing in image captioning.";
const CAPTION_INSTRUCTION: &str = "Describe this image in a single sentence";

/// Per-request options of [Assistant::generate] and [Assistant::stream].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Answer in the site default locale instead of the user's.
    pub force_default_locale: bool,
    /// Instruction of the `custom_prompt` prompt. Ignored by other prompts.
    pub custom_instruction: Option<String>,
}

/// Post-processed output of a one-shot generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
    /// One suggestion, or one per list item for [PromptType::List] prompts.
    pub suggestions: Vec<String>,
    /// Inline diff of the input against the suggestion, for [PromptType::Diff] prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// An uploaded image, reachable by the caption backend at `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub id: u64,
    pub url: Url,
}

/// Turn the raw output of a prompt into a [GenerationResult].
pub fn post_process(prompt_type: PromptType, raw: &str, input: &str) -> GenerationResult {
    match prompt_type {
        PromptType::List => GenerationResult {
            prompt_type,
            suggestions: parse_list(raw).iter().map(|item| sanitize(item)).collect(),
            diff: None,
        },
        PromptType::Simple => GenerationResult {
            prompt_type,
            suggestions: vec![sanitize(raw)],
            diff: None,
        },
        PromptType::Diff => {
            let sanitized = sanitize(raw);
            let diff = inline_diff(input, &sanitized);
            GenerationResult {
                prompt_type,
                suggestions: vec![sanitized],
                diff: Some(diff),
            }
        }
    }
}

/// AI helper of one site.
pub struct Assistant {
    site: String,
    config: AssistantConfig,
    helper_llm: Arc<dyn CompletionBackend>,
    caption_llm: Arc<dyn CompletionBackend>,
    catalog: Arc<dyn CatalogStore>,
    locales: Arc<dyn LocaleMetadata>,
    translations: Arc<dyn Translations>,
    sink: Arc<dyn PublishSink>,
    clock: Arc<dyn Clock>,
    cache: Arc<PromptCatalogCache>,
}

impl Assistant {
    /// Create an assistant for `site` with default configuration, builtin language names, no translations and its
    /// own catalog cache. `helper_llm` also captions images unless [Assistant::with_caption_llm] says otherwise.
    pub fn new(site: impl Into<String>,
               helper_llm: Arc<dyn CompletionBackend>,
               catalog: Arc<dyn CatalogStore>,
               sink: Arc<dyn PublishSink>) -> Self {
        Self {
            site: site.into(),
            config: AssistantConfig::default(),
            caption_llm: helper_llm.clone(),
            helper_llm,
            catalog,
            locales: Arc::new(StaticLocaleNames::builtin()),
            translations: Arc::new(StaticTranslations::new()),
            sink,
            clock: Arc::new(SystemClock),
            cache: Arc::new(PromptCatalogCache::new()),
        }
    }

    pub fn with_config(mut self, config: AssistantConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_caption_llm(mut self, caption_llm: Arc<dyn CompletionBackend>) -> Self {
        self.caption_llm = caption_llm;
        self
    }

    pub fn with_locales(mut self, locales: Arc<dyn LocaleMetadata>) -> Self {
        self.locales = locales;
        self
    }

    pub fn with_translations(mut self, translations: Arc<dyn Translations>) -> Self {
        self.translations = translations;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a catalog cache with other assistants. Entries are keyed by site, so assistants of different sites
    /// do not see each other's listings.
    pub fn with_cache(mut self, cache: Arc<PromptCatalogCache>) -> Self {
        self.cache = cache;
        self
    }

    #[inline]
    pub fn site(&self) -> &str {
        &self.site
    }

    #[inline]
    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    fn localizer(&self) -> Localizer<'_> {
        Localizer {
            metadata: &*self.locales,
            clock: &*self.clock,
            default_locale: &self.config.default_locale,
        }
    }

    fn catalog_filter(&self) -> CatalogFilter {
        let mut filter = CatalogFilter::default();
        if !self.config.illustrate_post_enabled {
            filter.excluded_names.push(ILLUSTRATE_POST.to_string());
        }
        filter
    }

    /// The prompts `user` can pick from, in their locale. Cached per site and locale until
    /// [Assistant::invalidate_catalog_cache].
    pub async fn list_available_prompts(&self, user: Option<&User>) -> Result<Arc<Vec<CatalogEntry>>, AssistError> {
        let locale = resolve_locale(user, false, &self.config.default_locale);
        self.cache
            .get_or_try_init(&self.site, locale, || async {
                let definitions = self.catalog
                    .enabled_prompts(&self.catalog_filter())
                    .await
                    .map_err(AssistError::CatalogUnavailable)?;
                Ok::<_, AssistError>(definitions
                    .iter()
                    .map(|definition| catalog_entry(definition, locale, &*self.translations, &*self.locales))
                    .collect())
            })
            .await
    }

    /// Drop every cached listing of this site.
    pub fn invalidate_catalog_cache(&self) {
        self.cache.invalidate(&self.site);
    }

    async fn resolve_prompt(&self, prompt: &PromptRef) -> Result<Arc<PromptDefinition>, AssistError> {
        let definition = self.catalog
            .find(prompt)
            .await
            .map_err(AssistError::CatalogUnavailable)?
            .filter(|definition| definition.enabled && !self.catalog_filter().excludes(definition));
        definition.ok_or_else(|| AssistError::InvalidCatalogEntry(format!("{} does not exist or is disabled", prompt)))
    }

    fn prepare(&self,
               definition: &PromptDefinition,
               input: &str,
               user: Option<&User>,
               options: &GenerateOptions) -> Result<(LocalizedPrompt, GenerationParams), AssistError> {
        let mut prompt = definition.messages_with_input(input, options.custom_instruction.as_deref())?;
        self.localizer().localize(&mut prompt, user, options.force_default_locale);
        let params = GenerationParams {
            temperature: definition.temperature,
            stop_sequences: definition.stop_sequences.clone(),
            max_tokens: None,
            feature_name: self.config.feature_name.clone(),
            user_id: user.map(|u| u.id),
        };
        Ok((prompt, params))
    }

    /// Run `prompt` on `input` and wait for the whole answer.
    pub async fn generate(&self,
                          prompt: PromptRef,
                          input: &str,
                          user: Option<&User>,
                          options: &GenerateOptions) -> Result<GenerationResult, AssistError> {
        let definition = self.resolve_prompt(&prompt).await?;
        let (localized, params) = self.prepare(&definition, input, user, options)?;
        let raw = self.helper_llm.complete(&localized, &params).await?;
        debug!("{} produced {} chars", prompt, raw.len());
        Ok(post_process(definition.prompt_type, &raw, input))
    }

    /// Run `prompt` on `input`, publishing progress on `channel` to `user` only.
    ///
    /// Firing `cancel` stops the backend and publishes what was accumulated so far as the final result.
    pub async fn stream(&self,
                        prompt: PromptRef,
                        input: &str,
                        user: &User,
                        channel: &str,
                        options: &GenerateOptions,
                        cancel: CancellationToken) -> Result<StreamOutcome, AssistError> {
        let definition = self.resolve_prompt(&prompt).await?;
        let (localized, params) = self.prepare(&definition, input, Some(user), options)?;
        let fragments = self.helper_llm.stream(&localized, &params, cancel.clone()).await?;
        let context = StreamContext {
            input,
            prompt_type: definition.prompt_type,
            throttle: &self.config.throttle,
        };
        let target = PublishTarget {
            sink: &*self.sink,
            channel,
            recipient: user.id,
        };
        drive_stream(fragments, &cancel, &context, &target).await
    }

    /// Describe `image` in one sentence, in the language of `user`.
    pub async fn caption(&self, image: &ImageUpload, user: Option<&User>) -> Result<String, AssistError> {
        let instruction = match self.localizer().locale_instructions(user, false) {
            Some(directive) => format!("{}. {}", CAPTION_INSTRUCTION, directive),
            None => CAPTION_INSTRUCTION.to_string(),
        };
        let prompt = LocalizedPrompt::new(vec![
            Message::system(CAPTION_SYSTEM_PROMPT),
            Message::user(instruction).with_image(image.url.clone()),
        ]);
        let params = GenerationParams {
            max_tokens: Some(self.config.caption.max_tokens),
            feature_name: self.config.caption_feature_name.clone(),
            user_id: user.map(|u| u.id),
            ..GenerationParams::default()
        };
        let raw = self.caption_llm.complete(&prompt, &params).await?;
        debug!("caption of upload {} has {} chars", image.id, raw.len());
        Ok(squish_and_truncate_words(&raw, CAPTION_SEPARATOR, self.config.caption.max_words))
    }
}
