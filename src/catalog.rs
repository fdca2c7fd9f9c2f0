//! # Catalog
//! The display-ready list of prompts a user can pick from.
//!
//! Definitions come from a [CatalogStore]. Each enabled definition is mapped to a [CatalogEntry] with a translated
//! display name, an icon and the UI surfaces it is offered on. The mapped list is cached per `(site, locale)` by
//! [PromptCatalogCache](cache::PromptCatalogCache).

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde::Serialize;
use crate::locale::{lookup_language_or_base, LocaleMetadata};
use crate::prompt::{PromptDefinition, PromptId, PromptRef, PromptType};

pub mod cache;

/// Name of the prompt hidden when image generation is disabled.
pub const ILLUSTRATE_POST: &str = "illustrate_post";
/// Name of the prompt whose display name mentions the target language.
pub const TRANSLATE: &str = "translate";

/// Restrictions applied by the store when listing prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    /// Prompt names to leave out even when enabled.
    pub excluded_names: Vec<String>,
}

impl CatalogFilter {
    pub fn excludes(&self, definition: &PromptDefinition) -> bool {
        self.excluded_names.iter().any(|name| *name == definition.name)
    }
}

/// Read-only access to prompt definitions.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Enabled definitions in display order, minus those the filter excludes.
    async fn enabled_prompts(&self, filter: &CatalogFilter) -> anyhow::Result<Vec<Arc<PromptDefinition>>>;

    /// Look up a single definition, enabled or not.
    async fn find(&self, prompt: &PromptRef) -> anyhow::Result<Option<Arc<PromptDefinition>>>;
}

/// A catalog held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    prompts: Vec<Arc<PromptDefinition>>,
}

impl InMemoryCatalog {
    pub fn new(prompts: Vec<PromptDefinition>) -> Self {
        Self {
            prompts: prompts.into_iter().map(Arc::new).collect(),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn enabled_prompts(&self, filter: &CatalogFilter) -> anyhow::Result<Vec<Arc<PromptDefinition>>> {
        Ok(self.prompts
            .iter()
            .filter(|p| p.enabled && !filter.excludes(p))
            .cloned()
            .collect())
    }

    async fn find(&self, prompt: &PromptRef) -> anyhow::Result<Option<Arc<PromptDefinition>>> {
        Ok(self.prompts.iter().find(|p| prompt.matches(p)).cloned())
    }
}

/// A UI surface a prompt can be offered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Composer,
    Post,
}

/// One prompt as shown in a picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: PromptId,
    pub name: String,
    pub translated_name: String,
    pub prompt_type: PromptType,
    pub icon: Option<&'static str>,
    pub location: &'static [Location],
}

pub fn icon_for(name: &str) -> Option<&'static str> {
    match name {
        "translate" => Some("language"),
        "generate_titles" => Some("heading"),
        "proofread" => Some("spell-check"),
        "markdown_table" => Some("table"),
        "tone" => Some("microphone"),
        "custom_prompt" => Some("comment"),
        "rewrite" => Some("pen"),
        "explain" => Some("question"),
        "illustrate_post" => Some("images"),
        "replace_dates" => Some("calendar-days"),
        _ => None,
    }
}

pub fn locations_for(name: &str) -> &'static [Location] {
    use Location::{Composer, Post};
    match name {
        "translate" | "proofread" | "custom_prompt" => &[Composer, Post],
        "generate_titles" | "markdown_table" | "tone" | "rewrite" | "illustrate_post" | "replace_dates" => &[Composer],
        "explain" | "summarize" => &[Post],
        _ => &[],
    }
}

/// Translated UI strings, looked up by locale and key. `%{name}` in a string is replaced by the argument `name`.
pub trait Translations: Send + Sync {
    fn translate(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> Option<String>;
}

/// Translations held in memory. Falls back from a regional locale to its base language.
#[derive(Debug, Clone, Default)]
pub struct StaticTranslations {
    strings: HashMap<(String, String), String>,
}

impl StaticTranslations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: impl Into<String>, key: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.strings.insert((locale.into(), key.into()), text.into());
        self
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&String> {
        self.strings.get(&(locale.to_string(), key.to_string())).or_else(|| {
            let (base, _) = locale.split_once('_')?;
            self.strings.get(&(base.to_string(), key.to_string()))
        })
    }
}

impl Translations for StaticTranslations {
    fn translate(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> Option<String> {
        self.lookup(locale, key).map(|text| {
            args.iter().fold(text.clone(), |text, (name, value)| text.replace(&format!("%{{{name}}}"), value))
        })
    }
}

/// Translation key of the display name of a prompt.
pub fn display_name_key(prompt_name: &str) -> String {
    format!("ai_helper.prompts.{prompt_name}")
}

/// The display name of a prompt in `locale`.
///
/// Falls back to the name stored with the definition, then to its internal name. The `translate` prompt names the
/// native language of `locale`.
pub fn display_name(definition: &PromptDefinition,
                    locale: &str,
                    translations: &dyn Translations,
                    metadata: &dyn LocaleMetadata) -> String {
    let key = display_name_key(&definition.name);
    let translated = if definition.name == TRANSLATE {
        lookup_language_or_base(metadata, locale)
            .ok()
            .and_then(|language| translations.translate(locale, &key, &[("language", &language.native_name)]))
    } else {
        translations.translate(locale, &key, &[])
    };
    translated
        .or_else(|| definition.translated_name.clone())
        .unwrap_or_else(|| definition.name.clone())
}

/// Build the entry shown for `definition`.
pub fn catalog_entry(definition: &PromptDefinition,
                     locale: &str,
                     translations: &dyn Translations,
                     metadata: &dyn LocaleMetadata) -> CatalogEntry {
    CatalogEntry {
        id: definition.id,
        name: definition.name.clone(),
        translated_name: display_name(definition, locale, translations, metadata),
        prompt_type: definition.prompt_type,
        icon: icon_for(&definition.name),
        location: locations_for(&definition.name),
    }
}
