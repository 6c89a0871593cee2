//! Sentiment weighting pipeline: filter → weight → normalize → project.

pub mod normalize;
pub mod series;
pub mod weighting;

pub use normalize::normalize;
pub use series::{join_series, rename_fin_columns};
pub use weighting::{follower_multiplier, remove_neutral, weight_sentiment, WeightedPost};

use rust_decimal::Decimal;
use tracing::info;

use crate::config::DEFAULT_SENTIMENT_THRESHOLD;
use crate::error::Result;
use crate::types::{Account, Post, ScoredPost, SentimentModel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareOptions {
    /// Posts with |sentiment| at or below this are dropped as neutral.
    pub threshold: f64,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SENTIMENT_THRESHOLD,
        }
    }
}

/// Runs the whole batch through the pipeline. Every output `score` lies in [-1, 1].
pub fn prepare(
    posts: Vec<Post>,
    accounts: &[Account],
    model: SentimentModel,
    options: PrepareOptions,
) -> Result<Vec<ScoredPost>> {
    let total = posts.len();
    let kept = remove_neutral(posts, model, options.threshold)?;
    let weighted = weight_sentiment(&kept, accounts, model)?;

    let values: Vec<Decimal> = weighted.iter().map(|w| w.weighted).collect();
    let normalized = normalize(&values);

    let scored: Vec<ScoredPost> = weighted
        .into_iter()
        .zip(normalized)
        .map(|(w, n)| ScoredPost {
            id: w.id,
            user_id: w.user_id,
            created_at: w.created_at,
            raw: w.raw,
            weighted: w.weighted,
            normalized: n,
            score: n,
        })
        .collect();

    info!(
        model = %model,
        total,
        scored = scored.len(),
        accounts = accounts.len(),
        "pipeline complete"
    );
    Ok(scored)
}
