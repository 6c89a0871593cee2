use std::collections::HashMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::types::{Account, Post, SentimentModel};

/// A post carrying its raw and follower-weighted sentiment.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPost {
    pub id: String,
    pub user_id: String,
    pub created_at: Option<i64>,
    pub raw: Decimal,
    pub weighted: Decimal,
}

/// Drops posts whose |sentiment| is at or below `threshold`.
pub fn remove_neutral(posts: Vec<Post>, model: SentimentModel, threshold: f64) -> Result<Vec<Post>> {
    let before = posts.len();
    let mut kept = Vec::with_capacity(before);
    for post in posts {
        if post.require_sentiment(model)?.abs() > threshold {
            kept.push(post);
        }
    }
    debug!(
        model = %model,
        threshold,
        kept = kept.len(),
        dropped = before - kept.len(),
        "neutral filter"
    );
    Ok(kept)
}

/// `followers^(1/8)`. Nested square roots keep perfect eighth powers exact.
pub fn follower_multiplier(followers: u64) -> Decimal {
    let root = (followers as f64).sqrt().sqrt().sqrt();
    // Finite and at most 256 for any u64, so the conversion cannot fail.
    Decimal::from_f64(root).unwrap_or(Decimal::ZERO)
}

/// Scales each post's sentiment by its author's follower multiplier.
/// Builds a new batch; the input is never modified. Posts whose author is
/// not among `accounts` keep their raw sentiment.
pub fn weight_sentiment(
    posts: &[Post],
    accounts: &[Account],
    model: SentimentModel,
) -> Result<Vec<WeightedPost>> {
    let multipliers: HashMap<&str, Decimal> = accounts
        .iter()
        .map(|a| (a.id.as_str(), follower_multiplier(a.followers)))
        .collect();

    let mut orphans = 0usize;
    let weighted = posts
        .iter()
        .map(|post| {
            let value = post.require_sentiment(model)?;
            let raw = Decimal::from_f64(value).ok_or_else(|| AppError::InvalidSentiment {
                post_id: post.id.clone(),
                value,
            })?;
            let weighted = match multipliers.get(post.user_id.as_str()) {
                Some(m) => raw * m,
                None => {
                    orphans += 1;
                    raw
                }
            };
            Ok(WeightedPost {
                id: post.id.clone(),
                user_id: post.user_id.clone(),
                created_at: post.created_at,
                raw,
                weighted,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if orphans > 0 {
        warn!(orphans, "posts without a matching account were left unweighted");
    }
    Ok(weighted)
}
