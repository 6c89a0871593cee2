use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::types::{SentimentModel, StopCondition};

pub const API_BASE_URL: &str = "https://api.twitter.com/1.1";
pub const STREAM_URL: &str = "https://stream.twitter.com/1.1/statuses/filter.json";
pub const FLAIR_URL: &str = "http://localhost:8000/predict";

/// Local wall-clock hour at which the equity market is considered closed.
pub const MARKET_CLOSE_HOUR: u32 = 16;

/// Posts with |sentiment| at or below this are dropped as noise.
pub const DEFAULT_SENTIMENT_THRESHOLD: f64 = 0.2;

/// HTTP statuses the stream uses to signal rate limiting (420 legacy, 429 current).
pub const RATE_LIMIT_STATUSES: &[u16] = &[420, 429];

/// Reconnect backoff values in milliseconds (doubling, capped at the last entry).
pub const RECONNECT_BACKOFF_MS: &[u64] = &[250, 500, 1_000, 2_000, 4_000, 8_000, 16_000];

/// Timeout for REST calls (credential check, handle lookup, scorer).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Stream bodies are idle for at most ~30s between keep-alives; treat 90s of silence as a stall.
pub const STREAM_STALL_SECS: u64 = 90;

/// Largest partial stream message kept while waiting for its line terminator.
pub const MAX_PENDING_LINE_BYTES: usize = 1 << 20;

/// Log a progress line every this many received stream messages.
pub const STREAM_PROGRESS_EVERY: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParams {
    pub track_list: Vec<String>,
    /// Screen names, resolved to numeric ids before streaming.
    pub follow_list: Vec<String>,
    /// Run the session on a spawned task instead of inline.
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub log_level: String,
    pub credentials: Credentials,
    pub filter: FilterParams,
    pub stop_condition: StopCondition,
    pub output_path: PathBuf,
    pub api_base_url: String,
    pub stream_url: String,
    /// Port for the status endpoint (API_PORT). None disables it.
    pub api_port: Option<u16>,
}

impl StreamConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |k: &str| {
            var(k)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{k} must be set")))
        };

        let credentials = Credentials {
            consumer_key: required("TWITTER_CONSUMER_KEY")?,
            consumer_secret: required("TWITTER_CONSUMER_SECRET")?,
            access_token: required("TWITTER_ACCESS_TOKEN")?,
            access_token_secret: required("TWITTER_ACCESS_TOKEN_SECRET")?,
        };

        let filter = FilterParams {
            track_list: split_list(var("TRACK_LIST")),
            follow_list: split_list(var("FOLLOW_LIST"))
                .into_iter()
                .map(|h| h.trim_start_matches('@').to_string())
                .collect(),
            is_async: parse_bool(var("STREAM_ASYNC"), "STREAM_ASYNC", false)?,
        };
        if filter.track_list.is_empty() && filter.follow_list.is_empty() {
            return Err(AppError::Config(
                "at least one of TRACK_LIST or FOLLOW_LIST must be set".to_string(),
            ));
        }

        let stop_condition = var("STOP_CONDITION")
            .unwrap_or_else(|| "market".to_string())
            .parse::<StopCondition>()?;

        let api_port = match var("API_PORT") {
            Some(p) if !p.trim().is_empty() => Some(p.trim().parse::<u16>().map_err(|_| {
                AppError::Config("API_PORT must be a valid port number".to_string())
            })?),
            _ => None,
        };

        Ok(Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            credentials,
            filter,
            stop_condition,
            output_path: var("STREAM_OUTPUT_PATH")
                .unwrap_or_else(|| "tweets.jsonl".to_string())
                .into(),
            api_base_url: var("TWITTER_API_URL").unwrap_or_else(|| API_BASE_URL.to_string()),
            stream_url: var("TWITTER_STREAM_URL").unwrap_or_else(|| STREAM_URL.to_string()),
            api_port,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub log_level: String,
    pub db_path: String,
    pub model: SentimentModel,
    pub threshold: f64,
    /// Score posts that have no value for `model` before weighting (SCORE_MISSING).
    pub score_missing: bool,
    pub flair_url: String,
    pub output_dir: PathBuf,
    /// Listener output consumed by the `ingest` binary.
    pub ingest_path: PathBuf,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let threshold = match var("SENTIMENT_THRESHOLD") {
            Some(t) => t.trim().parse::<f64>().map_err(|_| {
                AppError::Config("SENTIMENT_THRESHOLD must be a number".to_string())
            })?,
            None => DEFAULT_SENTIMENT_THRESHOLD,
        };
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AppError::Config(
                "SENTIMENT_THRESHOLD must be a non-negative number".to_string(),
            ));
        }

        Ok(Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: var("DB_PATH").unwrap_or_else(|| "sentiment.db".to_string()),
            model: var("SENTIMENT_MODEL")
                .unwrap_or_else(|| "flair".to_string())
                .parse()?,
            threshold,
            score_missing: parse_bool(var("SCORE_MISSING"), "SCORE_MISSING", true)?,
            flair_url: var("FLAIR_URL").unwrap_or_else(|| FLAIR_URL.to_string()),
            output_dir: var("OUTPUT_DIR").unwrap_or_else(|| ".".to_string()).into(),
            ingest_path: var("STREAM_OUTPUT_PATH")
                .unwrap_or_else(|| "tweets.jsonl".to_string())
                .into(),
        })
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: Option<String>, name: &str, default: bool) -> Result<bool> {
    match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(s) if s.is_empty() => Ok(default),
        Some(s) => match s.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(AppError::Config(format!("{name} must be true or false"))),
        },
    }
}
