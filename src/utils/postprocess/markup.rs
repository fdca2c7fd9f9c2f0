use regex::Regex;
use lazy_static::lazy_static;
use scraper::{Html, Selector};

/// Wrapper tags the prompts ask the model to emit. They must never reach the user.
pub const SANITIZED_TAGS: [&str; 7] = ["term", "context", "topic", "replyTo", "input", "output", "result"];

lazy_static! {
    static ref SANITIZE_RE: Regex = {
        let alternatives: Vec<String> = SANITIZED_TAGS
            .iter()
            .map(|tag| format!(r"<{tag}>\n?|\n?</{tag}>"))
            .collect();
        Regex::new(&format!("(?i){}", alternatives.join("|"))).unwrap()
    };
}

/// Removes the reserved wrapper tags, together with a line break right after an opening tag or right before a
/// closing tag. Matching is case-insensitive.
///
/// # Example
/// ```
/// use promptcraft::utils::postprocess::markup::sanitize;
/// assert_eq!("Hello there", sanitize("<RESULT>\nHello there\n</result>"));
/// ```
pub fn sanitize(text: &str) -> String {
    SANITIZE_RE.replace_all(text, "").into_owned()
}

fn is_reserved_tag_prefix(tail: &str) -> bool {
    let tail = tail.to_ascii_lowercase();
    SANITIZED_TAGS.iter().any(|tag| {
        let tag = tag.to_ascii_lowercase();
        format!("<{tag}>").starts_with(&tail) || format!("</{tag}>").starts_with(&tail)
    })
}

/// The part of a partially streamed text that later fragments cannot change once sanitized.
///
/// Holds back a trailing, unfinished reserved tag (`"<resu"`) and a trailing line break, which a closing tag may
/// still swallow.
pub fn stable_prefix(text: &str) -> &str {
    let mut end = text.len();
    if let Some(lt) = text.rfind('<') {
        let tail = &text[lt..];
        if !tail.contains('>') && is_reserved_tag_prefix(tail) {
            end = lt;
        }
    }
    let stable = &text[..end];
    stable.strip_suffix('\n').unwrap_or(stable)
}

/// Sanitize text that may still grow. See [stable_prefix].
#[inline]
pub fn sanitize_partial(text: &str) -> String {
    sanitize(stable_prefix(text))
}

/// Extracts the text of every `<item>` element in document order.
///
/// The markup is parsed leniently, so garbage yields an empty list instead of an error.
pub fn parse_list(markup: &str) -> Vec<String> {
    let selector = match Selector::parse("item") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };
    Html::parse_fragment(markup)
        .select(&selector)
        .map(|item| item.text().collect::<String>())
        .collect()
}

/// Removes `separator`, collapses whitespace runs into single spaces and keeps at most `max_words` words.
///
/// When words are dropped, `"..."` is appended to the last word kept.
pub fn squish_and_truncate_words(text: &str, separator: char, max_words: usize) -> String {
    let stripped: String = text.chars().filter(|c| *c != separator).collect();
    let mut words = stripped.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();
    let mut result = kept.join(" ");
    if words.next().is_some() {
        result.push_str("...");
    }
    result
}
