use crate::{LineIndex, TokenIndex};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex");
}

/// A non-blank line of a document with its valid tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedLine<'a> {
    pub line_index: LineIndex,
    pub text: &'a str,
    pub tokens: Vec<(String, TokenIndex)>,
}

/// Canonical form of a single word: NFKC folded, lowercased, letters and digits only.
///
/// Returns `(token, false)` when nothing survives, e.g. for pure punctuation.
pub fn normalize(word: &str) -> (String, bool) {
    let folded = word.nfkc().collect::<String>().to_lowercase();
    let token = NON_ALNUM.replace_all(&folded, "").into_owned();
    let valid = !token.is_empty();
    (token, valid)
}

/// Whitespace-split a line into valid tokens; the index counts valid tokens only.
pub fn tokenize_line(line: &str) -> Vec<(String, TokenIndex)> {
    line.split_whitespace()
        .filter_map(|word| match normalize(word) {
            (token, true) => Some(token),
            _ => None,
        })
        .zip(0..)
        .collect()
}

/// Split a document body into its non-blank lines, numbered from zero.
/// Blank lines do not consume a line index.
pub fn tokenize(text: &str) -> Vec<TokenizedLine<'_>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .zip(0..)
        .map(|(text, line_index)| TokenizedLine { line_index, text, tokens: tokenize_line(text) })
        .collect()
}

/// Normalize query terms, dropping invalid ones and repeats (first occurrence wins).
pub fn normalize_query_terms<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .filter_map(|term| match normalize(term.as_ref()) {
            (token, true) => Some(token),
            _ => None,
        })
        .filter(|token| seen.insert(token.clone()))
        .collect()
}
