//! Lexicon-based sentiment scoring for whole-text analysis responses.

use serde::{Deserialize, Serialize};

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "best", "better", "positive",
    "true", "correct",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "wrong", "false", "incorrect", "worst", "worse",
    "negative", "poor",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentiment {
    pub sentiment: String,
    pub score: f32,
    pub positive_words: usize,
    pub negative_words: usize,
}

/// Score text on a 0..1 scale, 0.5 being neutral.
pub fn analyze_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

    let (sentiment, score) = if positive > negative {
        (
            "positive",
            (0.5 + (positive - negative) as f32 * 0.1).min(1.0),
        )
    } else if negative > positive {
        (
            "negative",
            (0.5 - (negative - positive) as f32 * 0.1).max(0.0),
        )
    } else {
        ("neutral", 0.5)
    };

    Sentiment {
        sentiment: sentiment.to_string(),
        score,
        positive_words: positive,
        negative_words: negative,
    }
}
