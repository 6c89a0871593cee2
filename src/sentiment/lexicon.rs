use async_trait::async_trait;

use crate::error::Result;
use crate::sentiment::scorer::SentimentScorer;
use crate::types::SentimentModel;

const POSITIVE: &[&str] = &[
    "bull", "bullish", "buy", "buying", "beat", "beats", "boom", "breakout", "gain", "gains",
    "good", "great", "green", "growth", "high", "higher", "moon", "optimistic", "profit",
    "profits", "rally", "rallies", "rebound", "record", "recovery", "rise", "rising", "soar",
    "soaring", "strong", "surge", "up", "upgrade", "win", "winning",
];

const NEGATIVE: &[&str] = &[
    "bad", "bear", "bearish", "collapse", "crash", "crashing", "cut", "decline", "default",
    "down", "downgrade", "drop", "dump", "fall", "falling", "fear", "loss", "losses", "lower",
    "miss", "panic", "plunge", "recession", "red", "risk", "sell", "selloff", "slump", "tank",
    "weak", "worse", "worst",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "isn't", "wasn't", "aren't", "won't", "don't", "doesn't", "can't",
];

/// Word-list scorer for market talk: `(pos - neg) / (pos + neg)`, with a
/// sentiment word directly after a negation counted on the opposite side.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score_text(&self, text: &str) -> f64 {
        let mut pos = 0u32;
        let mut neg = 0u32;
        let mut negated = false;

        for raw in text.split_whitespace() {
            let token = raw
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase();
            let token = token.as_str();
            if NEGATIONS.contains(&token) {
                negated = true;
                continue;
            }
            let polarity = if POSITIVE.contains(&token) {
                1
            } else if NEGATIVE.contains(&token) {
                -1
            } else {
                0
            };
            match (polarity, negated) {
                (1, false) | (-1, true) => pos += 1,
                (-1, false) | (1, true) => neg += 1,
                _ => {}
            }
            negated = false;
        }

        if pos + neg == 0 {
            return 0.0;
        }
        (pos as f64 - neg as f64) / (pos + neg) as f64
    }
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    fn model(&self) -> SentimentModel {
        SentimentModel::Lexicon
    }

    async fn score(&self, text: &str) -> Result<f64> {
        Ok(self.score_text(text))
    }
}
