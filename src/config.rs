//! # Configuration
//! Everything the assistant reads from site settings. All fields have defaults, so a partial JSON document
//! (or none at all) yields a working configuration.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Settings for one [Assistant](crate::assistant::Assistant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Locale used when no user is given or when the caller forces the default.
    pub default_locale: String,
    pub throttle: ThrottleConfig,
    pub caption: CaptionConfig,
    /// When false, the `illustrate_post` prompt is hidden from the catalog.
    pub illustrate_post_enabled: bool,
    /// Feature tag sent to the backend with text prompts.
    pub feature_name: String,
    /// Feature tag sent to the backend with image captions.
    pub caption_feature_name: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            throttle: ThrottleConfig::default(),
            caption: CaptionConfig::default(),
            illustrate_post_enabled: true,
            feature_name: "ai_helper".to_string(),
            caption_feature_name: "image_caption".to_string(),
        }
    }
}

impl AssistantConfig {
    /// Parse a configuration from JSON. Missing fields take their default values.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// When the streaming engine publishes partial results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// The accumulated text must be longer than this (in characters) before a partial flush.
    pub min_chars: usize,
    /// Minimum time between two partial flushes.
    pub min_interval_ms: u64,
    /// Flush on every fragment, ignoring the two limits above. Meant for deterministic tests.
    pub flush_always: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_chars: 10,
            min_interval_ms: 300,
            flush_always: false,
        }
    }
}

impl ThrottleConfig {
    #[inline]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub max_words: usize,
    pub max_tokens: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            max_words: 50,
            max_tokens: 1024,
        }
    }
}
