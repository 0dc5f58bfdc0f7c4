//! Term matching and match-centred excerpts.
//!
//! Matching is case-insensitive literal substring search. The same compiled matcher drives
//! both result filtering and snippet location, so a document that passed the filter always
//! has a locatable match.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::ops::Range;

use crate::error::ValidationError;

const ELLIPSIS: &str = "...";
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: String,
    re: Regex,
}

impl TermMatcher {
    /// Builds a matcher for the trimmed term. Whitespace-only terms are rejected.
    pub fn new(term: &str) -> Result<Self, ValidationError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ValidationError::EmptyTerm);
        }
        let re = RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
            .map_err(|e| ValidationError::InvalidTerm(e.to_string()))?;
        Ok(Self { term: term.to_string(), re })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.is_match(text)
    }

    /// Byte range of the first occurrence.
    pub fn find(&self, text: &str) -> Option<Range<usize>> {
        self.re.find(text).map(|m| m.range())
    }

    pub fn snippet(&self, text: &str, radius: usize) -> Snippet {
        let Some(first) = self.find(text) else {
            return Snippet { excerpt: preview(text), match_offsets: Vec::new() };
        };
        let start = back_chars(text, first.start, radius);
        let end = forward_chars(text, first.end, radius);
        let window = &text[start..end];

        let prefix = if start > 0 { ELLIPSIS } else { "" };
        let suffix = if end < text.len() { ELLIPSIS } else { "" };
        let mut excerpt = String::with_capacity(prefix.len() + window.len() + suffix.len());
        excerpt.push_str(prefix);
        excerpt.push_str(window);
        excerpt.push_str(suffix);

        let base = prefix.len();
        let match_offsets = self
            .re
            .find_iter(window)
            .map(|m| MatchOffset { start: base + m.start(), end: base + m.end() })
            .collect();
        Snippet { excerpt, match_offsets }
    }
}

/// Byte range of a match inside [`Snippet::excerpt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchOffset {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub excerpt: String,
    pub match_offsets: Vec<MatchOffset>,
}

impl Snippet {
    /// Excerpt with each match wrapped in `open`/`close`.
    pub fn highlighted(&self, open: &str, close: &str) -> String {
        let mut out = String::with_capacity(
            self.excerpt.len() + self.match_offsets.len() * (open.len() + close.len()),
        );
        let mut cursor = 0;
        for m in &self.match_offsets {
            out.push_str(&self.excerpt[cursor..m.start]);
            out.push_str(open);
            out.push_str(&self.excerpt[m.start..m.end]);
            out.push_str(close);
            cursor = m.end;
        }
        out.push_str(&self.excerpt[cursor..]);
        out
    }
}

/// Excerpt of `text` around the first case-insensitive occurrence of `term`, keeping `radius`
/// characters of context on each side.
pub fn compute_snippet(text: &str, term: &str, radius: usize) -> Result<Snippet, ValidationError> {
    Ok(TermMatcher::new(term)?.snippet(text, radius))
}

/// Leading characters of a text for listings and as the snippet fallback.
pub fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(PREVIEW_CHARS - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

fn back_chars(text: &str, from: usize, n: usize) -> usize {
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(from)
}

fn forward_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}
