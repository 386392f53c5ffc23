//! Tokenizers for the overlap metrics.
//!
//! Both treat every CJK ideograph or kana as its own token; Chinese text has
//! no word separators and would otherwise collapse into one token per clause.

use std::sync::LazyLock;

use regex::Regex;

const CJK: &str = r"\p{Han}\p{Hiragana}\p{Katakana}";

static ROUGE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[{CJK}]|[[\p{{L}}\p{{N}}]--[{CJK}]]+"))
        .unwrap_or_else(|e| panic!("invalid rouge token pattern: {e}"))
});

static BLEU_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"[{CJK}]|[[\p{{L}}\p{{N}}]--[{CJK}]]+|[^\s\p{{L}}\p{{N}}]"
    ))
    .unwrap_or_else(|e| panic!("invalid bleu token pattern: {e}"))
});

/// Tokenizes text for ROUGE.
///
/// Lowercases and keeps letter/digit runs; punctuation is dropped.
#[must_use]
pub fn rouge_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    ROUGE_TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Tokenizes text for BLEU.
///
/// Case is preserved and each punctuation character becomes a token.
#[must_use]
pub fn bleu_tokens(text: &str) -> Vec<String> {
    BLEU_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Splits a summary into sentences for ROUGE-Lsum (one per non-empty line).
#[must_use]
pub fn sentences(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(rouge_tokens)
        .filter(|tokens| !tokens.is_empty())
        .collect()
}
