//! Word-level inline diff rendered as markup.

use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"\w+|\s+|[^\w\s]").unwrap();
}

/// Above this many LCS cells the changed middle is reported as one replacement.
const MAX_LCS_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Equal(&'a str),
    Delete(&'a str),
    Insert(&'a str),
}

fn tokenize(text: &str) -> Vec<&str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Longest-common-subsequence edit script for the middle part of two token lists.
fn lcs_chunks<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Chunk<'a>> {
    let (n, m) = (old.len(), new.len());
    if n == 0 || m == 0 || n.saturating_mul(m) > MAX_LCS_CELLS {
        let mut chunks: Vec<Chunk> = old.iter().map(|t| Chunk::Delete(*t)).collect();
        chunks.extend(new.iter().map(|t| Chunk::Insert(*t)));
        return chunks;
    }
    // lengths[i][j] = LCS length of old[i..] and new[j..]
    let mut lengths = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lengths[i][j] = if old[i] == new[j] {
                lengths[i + 1][j + 1] + 1
            } else {
                lengths[i + 1][j].max(lengths[i][j + 1])
            };
        }
    }
    let mut chunks = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            chunks.push(Chunk::Equal(old[i]));
            i += 1;
            j += 1;
        } else if lengths[i + 1][j] >= lengths[i][j + 1] {
            chunks.push(Chunk::Delete(old[i]));
            i += 1;
        } else {
            chunks.push(Chunk::Insert(new[j]));
            j += 1;
        }
    }
    chunks.extend(old[i..].iter().map(|t| Chunk::Delete(*t)));
    chunks.extend(new[j..].iter().map(|t| Chunk::Insert(*t)));
    chunks
}

fn diff_chunks<'a>(old: &'a str, new: &'a str) -> Vec<Chunk<'a>> {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);
    let prefix_len = old_tokens
        .iter()
        .zip(new_tokens.iter())
        .take_while(|(o, n)| o == n)
        .count();
    let suffix_len = old_tokens[prefix_len..]
        .iter()
        .rev()
        .zip(new_tokens[prefix_len..].iter().rev())
        .take_while(|(o, n)| o == n)
        .count();

    let mut chunks: Vec<Chunk> = old_tokens[..prefix_len].iter().map(|t| Chunk::Equal(*t)).collect();
    chunks.extend(lcs_chunks(
        &old_tokens[prefix_len..old_tokens.len() - suffix_len],
        &new_tokens[prefix_len..new_tokens.len() - suffix_len],
    ));
    chunks.extend(old_tokens[old_tokens.len() - suffix_len..].iter().map(|t| Chunk::Equal(*t)));
    chunks
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn flush_changes(out: &mut String, deleted: &mut String, inserted: &mut String) {
    if !deleted.is_empty() {
        out.push_str("<del>");
        escape_into(out, deleted);
        out.push_str("</del>");
        deleted.clear();
    }
    if !inserted.is_empty() {
        out.push_str("<ins>");
        escape_into(out, inserted);
        out.push_str("</ins>");
        inserted.clear();
    }
}

/// Renders the changes from `original` to `revised` inline.
///
/// Removed runs are wrapped in `<del>`, added runs in `<ins>`, everything else is HTML-escaped text.
///
/// # Example
/// ```
/// use promptcraft::utils::diff::inline_diff;
/// assert_eq!(
///     r#"<div class="inline-diff">The <del>cat</del><ins>dog</ins> sat.</div>"#,
///     inline_diff("The cat sat.", "The dog sat.")
/// );
/// ```
pub fn inline_diff(original: &str, revised: &str) -> String {
    let mut out = String::from(r#"<div class="inline-diff">"#);
    let mut deleted = String::new();
    let mut inserted = String::new();
    for chunk in diff_chunks(original, revised) {
        match chunk {
            Chunk::Equal(text) => {
                flush_changes(&mut out, &mut deleted, &mut inserted);
                escape_into(&mut out, text);
            }
            Chunk::Delete(text) => deleted.push_str(text),
            Chunk::Insert(text) => inserted.push_str(text),
        }
    }
    flush_changes(&mut out, &mut deleted, &mut inserted);
    out.push_str("</div>");
    out
}
