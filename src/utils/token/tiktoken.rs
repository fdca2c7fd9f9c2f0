use std::collections::HashMap;
use anyhow::{anyhow, Result};
pub use tiktoken_rs::{get_bpe_from_model, CoreBPE};

use crate::prompt::LocalizedPrompt;
use crate::utils::token::{completion_budget, count_prompt_tokens, CountToken};
use lazy_static::lazy_static;

lazy_static! {
    /// const map from model family to context window size.
    pub static ref MODEL_TO_MAX_TOKENS: HashMap<&'static str, usize> = HashMap::from([
        ("gpt-4", 8192),
        ("gpt-4-32k", 32768),
        ("gpt-4-turbo", 128000),
        ("gpt-3.5-turbo", 16385),
    ]);
}

fn model_family(model: &str) -> Option<&'static str> {
    if model.starts_with("gpt-4-32k") {
        Some("gpt-4-32k")
    } else if model.starts_with("gpt-4-turbo") || model.starts_with("gpt-4-1106") || model.starts_with("gpt-4-0125") || model.starts_with("gpt-4-vision") {
        Some("gpt-4-turbo")
    } else if model.starts_with("gpt-4") {
        Some("gpt-4")
    } else if model.starts_with("gpt-3.5") {
        Some("gpt-3.5-turbo")
    } else {
        None
    }
}

/// Counter using the Tiktoken tokenizer.
#[derive(Clone)]
#[readonly::make]
pub struct Tiktoken {
    /// The model family of the tokenizer. read-only.
    #[readonly]
    pub model: String,
    /// Context window of the model family. read-only.
    #[readonly]
    pub max_tokens: usize,
    bpe: CoreBPE,
}

impl Tiktoken {
    /// Create a new Tiktoken counter. Fails for models without a known tokenizer.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let family = model_family(&model).ok_or_else(|| anyhow!("model {} is not supported", model))?;
        let max_tokens = MODEL_TO_MAX_TOKENS.get(family).copied().unwrap_or_default();
        // the turbo family shares the gpt-4 tokenizer
        let bpe_model = if family == "gpt-4-turbo" { "gpt-4" } else { family };
        let bpe = get_bpe_from_model(bpe_model)?;
        Ok(Tiktoken {
            model: family.to_string(),
            max_tokens,
            bpe,
        })
    }

    /// Clamp a requested completion length so that prompt and completion fit in the context window.
    pub fn clamp_completion(&self, prompt: &LocalizedPrompt, requested: usize) -> usize {
        completion_budget(count_prompt_tokens(prompt, self), self.max_tokens, requested)
    }
}

impl CountToken for Tiktoken {
    fn count_token(&self, string: &str) -> usize {
        self.bpe.encode_with_special_tokens(string).len()
    }
}
