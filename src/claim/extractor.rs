//! Sentence-level claim extraction.
//!
//! A lightweight, deterministic stand-in for an NLP extractor: questions are
//! converted to statements, text is split into sentences, and sentences that
//! look like checkable assertions are kept. Short inputs and inputs where
//! nothing matches fall back to the whole text as a single claim, so the
//! output is always finite and never loses the input entirely.

use regex::Regex;

/// Inputs shorter than this are treated as a single claim without splitting.
const MIN_SPLIT_LEN: usize = 50;

/// Verbs and connectives that usually mark a factual assertion.
const CLAIM_INDICATORS: &[&str] = &[
    "is", "are", "was", "were", "will be", "has", "have", "had", "can", "could", "should",
    "would", "must", "may", "might", "because", "therefore", "thus", "hence", "proves",
    "shows", "demonstrates", "always", "never", "every", "all", "none",
];

const QUESTION_STARTERS: &[&str] = &[
    "is ", "are ", "was ", "were ", "will ", "do ", "does ", "did ", "can ", "could ",
    "should ", "would ", "has ", "have ", "had ",
];

pub struct ClaimExtractor {
    sentence_re: Regex,
    digit_re: Regex,
}

impl ClaimExtractor {
    pub fn new() -> Self {
        Self {
            // Sentence boundary: terminator followed by whitespace and an
            // upper-case or digit start. Deliberately naive about
            // abbreviations; bad splits only produce extra candidate claims.
            sentence_re: Regex::new(r"(?s)[^.!?]*[.!?]+(?:\s+|$)|[^.!?]+$").expect("valid regex"),
            digit_re: Regex::new(r"\d").expect("valid regex"),
        }
    }

    /// Extract candidate claims from free-form text, in document order.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let text = convert_question_to_statement(text.trim());
        if text.is_empty() {
            return Vec::new();
        }
        if text.len() < MIN_SPLIT_LEN {
            return vec![text];
        }

        let sentences: Vec<String> = self
            .sentence_re
            .find_iter(&text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let claims: Vec<String> = sentences
            .into_iter()
            .filter(|s| self.is_claim(s))
            .collect();

        if claims.is_empty() {
            vec![text]
        } else {
            claims
        }
    }

    /// A sentence counts as a claim when it carries a number, a likely named
    /// entity (interior capitalized word), or a common assertion indicator.
    fn is_claim(&self, sentence: &str) -> bool {
        if self.digit_re.is_match(sentence) {
            return true;
        }
        if has_interior_capital(sentence) {
            return true;
        }
        let lower = sentence.to_lowercase();
        CLAIM_INDICATORS
            .iter()
            .any(|ind| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *ind))
    }
}

impl Default for ClaimExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite a leading yes/no question as a statement so it can be checked as
/// an assertion ("Is the earth flat?" -> "The earth flat").
fn convert_question_to_statement(text: &str) -> String {
    let text = text.replace('?', "");
    let lower = text.to_lowercase();
    for starter in QUESTION_STARTERS {
        if lower.starts_with(starter) {
            let rest = text[starter.len()..].trim();
            if rest.is_empty() {
                return text;
            }
            let mut chars = rest.chars();
            let first = chars.next().map(|c| c.to_uppercase().to_string()).unwrap_or_default();
            return format!("{}{}", first, chars.as_str());
        }
    }
    text
}

/// True when a capitalized word appears past the sentence start, a cheap
/// proxy for a named entity.
fn has_interior_capital(sentence: &str) -> bool {
    sentence
        .split_whitespace()
        .skip(1)
        .any(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
}
