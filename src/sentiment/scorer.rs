use async_trait::async_trait;
use tracing::{debug, info};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::sentiment::clean::strip_urls;
use crate::types::SentimentModel;

/// Maps post text to a sentiment value in [-1, 1].
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    fn model(&self) -> SentimentModel;

    async fn score(&self, text: &str) -> Result<f64>;
}

/// Scores every stored post that has no value for the scorer's model yet,
/// one scorer call per post. Returns the number of posts scored.
pub async fn score_posts(repo: &Repository, scorer: &dyn SentimentScorer) -> Result<usize> {
    let model = scorer.model();
    let posts = repo.fetch_unscored_posts(model).await?;
    info!(model = %model, pending = posts.len(), "Scoring posts");

    for post in &posts {
        let text = strip_urls(&post.text);
        let value = scorer.score(&text).await?;
        if !value.is_finite() {
            return Err(AppError::InvalidSentiment {
                post_id: post.id.clone(),
                value,
            });
        }
        let value = value.clamp(-1.0, 1.0);
        repo.save_sentiment(&post.id, model, value).await?;
        debug!(post_id = %post.id, score = value, "scored");
    }

    info!(model = %model, scored = posts.len(), "Scoring complete");
    Ok(posts.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::db::repository::tests::post;

    /// Records what it was asked to score.
    struct Recording {
        seen: Mutex<Vec<String>>,
        value: f64,
    }

    #[async_trait]
    impl SentimentScorer for Recording {
        fn model(&self) -> SentimentModel {
            SentimentModel::Flair
        }

        async fn score(&self, text: &str) -> Result<f64> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(self.value)
        }
    }

    #[tokio::test]
    async fn scores_only_unscored_posts_with_urls_stripped() {
        let repo = Repository::in_memory().await.unwrap();
        let mut linked = post("1", "a", None);
        linked.text = "big rally https://t.co/xyz".to_string();
        repo.insert_post(&linked).await.unwrap();
        repo.insert_post(&post("2", "a", Some(0.3))).await.unwrap();

        let scorer = Recording {
            seen: Mutex::new(Vec::new()),
            value: 1.7,
        };
        assert_eq!(score_posts(&repo, &scorer).await.unwrap(), 1);
        assert_eq!(*scorer.seen.lock().unwrap(), vec!["big rally".to_string()]);

        let posts = repo.fetch_posts().await.unwrap();
        let scored: Vec<_> = posts.iter().map(|p| (p.id.as_str(), p.flair)).collect();
        assert!(scored.contains(&("1", Some(1.0))));
        assert!(scored.contains(&("2", Some(0.3))));

        // Second pass has nothing left to do.
        assert_eq!(score_posts(&repo, &scorer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn non_finite_score_is_rejected() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_post(&post("1", "a", None)).await.unwrap();
        let scorer = Recording {
            seen: Mutex::new(Vec::new()),
            value: f64::NAN,
        };
        assert!(matches!(
            score_posts(&repo, &scorer).await,
            Err(AppError::InvalidSentiment { .. })
        ));
    }
}
