use thiserror::Error;

use crate::types::SentimentModel;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication rejected (HTTP {0})")]
    Auth(u16),

    #[error("Could not resolve account handle @{handle}: {reason}")]
    UnknownHandle { handle: String, reason: String },

    #[error("Stream rate limited (HTTP {0})")]
    RateLimited(u16),

    #[error("Stream connection rejected (HTTP {0})")]
    StreamRejected(u16),

    #[error("Malformed {table} row: {reason}")]
    MalformedRow { table: &'static str, reason: String },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Post {post_id} has no {model} sentiment")]
    MissingSentiment { post_id: String, model: SentimentModel },

    #[error("Post {post_id} has non-finite sentiment {value}")]
    InvalidSentiment { post_id: String, value: f64 },

    #[error("Sentiment scorer error: {0}")]
    Scorer(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnNotFound(col) => AppError::MissingColumn(col),
            other => AppError::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
