pub mod clean;
pub mod flair;
pub mod lexicon;
pub mod scorer;

pub use flair::FlairScorer;
pub use lexicon::LexiconScorer;
pub use scorer::{score_posts, SentimentScorer};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::types::SentimentModel;

/// Scorer for the configured model.
pub fn build_scorer(cfg: &PipelineConfig) -> Result<Box<dyn SentimentScorer>> {
    Ok(match cfg.model {
        SentimentModel::Flair => Box::new(FlairScorer::new(cfg.flair_url.clone())?),
        SentimentModel::Lexicon => Box::new(LexiconScorer::new()),
    })
}
