//! Recognized placeholder tokens in prompt messages.
//!
//! The set is closed. Only the tokens below are ever substituted, in the order the
//! [localizer](crate::localizer) applies them.

use regex::Regex;
use lazy_static::lazy_static;

/// A placeholder token that may appear in prompt messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `%LANGUAGE%`, replaced by the English name of the resolved language.
    Language,
    /// `{{temporal_context}}`, replaced by a JSON object describing the current time of the user.
    TemporalContext,
    /// `{{date}}` or `{{date:<offset>}}`, replaced by a calendar date in the timezone of the user.
    Date,
}

impl Placeholder {
    /// The literal token for fixed placeholders. [Placeholder::Date] is matched by [DATE_PLACEHOLDER_RE] instead.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Placeholder::Language => Some("%LANGUAGE%"),
            Placeholder::TemporalContext => Some("{{temporal_context}}"),
            Placeholder::Date => None,
        }
    }

    pub fn is_in(&self, text: &str) -> bool {
        match self.token() {
            Some(token) => text.contains(token),
            None => DATE_PLACEHOLDER_RE.is_match(text),
        }
    }
}

lazy_static! {
    /// `{{date}}`, `{{date:+3d}}`, `{{date:-1w}}`, `{{date:2m}}`, `{{date:1y}}`
    pub static ref DATE_PLACEHOLDER_RE: Regex = Regex::new(r"\{\{date(?::([+-]?\d+)([dwmy]))?\}\}").unwrap();
}

/// Replace every occurrence of a fixed placeholder. Returns whether anything was replaced.
pub fn replace_placeholder(text: &mut String, placeholder: Placeholder, value: &str) -> bool {
    match placeholder.token() {
        Some(token) if text.contains(token) => {
            *text = text.replace(token, value);
            true
        }
        _ => false,
    }
}
