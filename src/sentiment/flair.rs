use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::sentiment::scorer::SentimentScorer;
use crate::types::SentimentModel;

#[derive(Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

/// Classifier output: a label plus the model's confidence in it.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    label: String,
    score: f64,
}

/// Client for a Flair text classifier served over HTTP.
/// POSITIVE with confidence p scores `p`, NEGATIVE scores `-p`.
pub struct FlairScorer {
    http: reqwest::Client,
    url: String,
}

impl FlairScorer {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SentimentScorer for FlairScorer {
    fn model(&self) -> SentimentModel {
        SentimentModel::Flair
    }

    async fn score(&self, text: &str) -> Result<f64> {
        let resp: PredictResponse = self
            .http
            .post(&self.url)
            .json(&PredictRequest { text })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match resp.label.to_ascii_uppercase().as_str() {
            "POSITIVE" => Ok(resp.score),
            "NEGATIVE" => Ok(-resp.score),
            other => Err(AppError::Scorer(format!("unexpected label '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    async fn predict(Json(body): Json<Value>) -> Json<Value> {
        let text = body["text"].as_str().unwrap_or_default();
        if text.contains("crash") {
            Json(json!({"label": "NEGATIVE", "score": 0.75}))
        } else if text.contains("???") {
            Json(json!({"label": "MIXED", "score": 0.5}))
        } else {
            Json(json!({"label": "POSITIVE", "score": 0.5}))
        }
    }

    async fn scorer() -> FlairScorer {
        let app = Router::new().route("/predict", post(predict));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        FlairScorer::new(format!("http://{addr}/predict")).unwrap()
    }

    #[tokio::test]
    async fn labels_map_to_signed_scores() {
        let s = scorer().await;
        assert_eq!(s.score("crash incoming").await.unwrap(), -0.75);
        assert_eq!(s.score("new highs").await.unwrap(), 0.5);
    }

    #[tokio::test]
    async fn unknown_label_is_a_scorer_error() {
        let s = scorer().await;
        assert!(matches!(s.score("???").await, Err(AppError::Scorer(_))));
    }
}
