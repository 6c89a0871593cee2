use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::MARKET_CLOSE_HOUR;
use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Financial series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Vix,
    Spx,
}

impl SeriesKind {
    pub fn table(self) -> &'static str {
        match self {
            SeriesKind::Vix => "vix",
            SeriesKind::Spx => "spx",
        }
    }

    /// Series-specific close column, so series can be joined without collisions.
    pub fn close_column(self) -> &'static str {
        match self {
            SeriesKind::Vix => "vix_close",
            SeriesKind::Spx => "spx_close",
        }
    }
}

impl std::fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Date-ordered close prices for one index.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialSeries {
    pub kind: SeriesKind,
    /// Column label used on output. `close` as fetched, series-specific after rename.
    pub column: String,
    pub points: Vec<PricePoint>,
}

impl FinancialSeries {
    pub fn new(kind: SeriesKind, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self {
            kind,
            column: "close".to_string(),
            points,
        }
    }

    pub fn renamed(self) -> Self {
        Self {
            column: self.kind.close_column().to_string(),
            ..self
        }
    }
}

/// One row of the VIX/SPX inner join.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketRow {
    pub date: NaiveDate,
    pub vix_close: f64,
    pub spx_close: f64,
}

// ---------------------------------------------------------------------------
// Posts and accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentModel {
    Flair,
    Lexicon,
}

impl SentimentModel {
    /// Column in the `tweets` table holding this model's raw score.
    pub fn column(self) -> &'static str {
        match self {
            SentimentModel::Flair => "flair",
            SentimentModel::Lexicon => "lexicon",
        }
    }
}

impl std::fmt::Display for SentimentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl FromStr for SentimentModel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flair" => Ok(SentimentModel::Flair),
            "lexicon" => Ok(SentimentModel::Lexicon),
            other => Err(AppError::Config(format!(
                "unknown sentiment model '{other}' (expected flair or lexicon)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub text: String,
    /// Unix seconds.
    pub created_at: Option<i64>,
    pub flair: Option<f64>,
    pub lexicon: Option<f64>,
    pub is_reply: bool,
    pub is_retweet: bool,
}

impl Post {
    pub fn sentiment(&self, model: SentimentModel) -> Option<f64> {
        match model {
            SentimentModel::Flair => self.flair,
            SentimentModel::Lexicon => self.lexicon,
        }
    }

    /// Raw score for `model`, failing if absent or non-finite.
    pub fn require_sentiment(&self, model: SentimentModel) -> Result<f64> {
        match self.sentiment(model) {
            None => Err(AppError::MissingSentiment {
                post_id: self.id.clone(),
                model,
            }),
            Some(v) if !v.is_finite() => Err(AppError::InvalidSentiment {
                post_id: self.id.clone(),
                value: v,
            }),
            Some(v) => Ok(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub screen_name: Option<String>,
    pub followers: u64,
}

/// A post after the weighting pipeline. `score` is the model-agnostic copy of `normalized`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPost {
    pub id: String,
    pub user_id: String,
    pub created_at: Option<i64>,
    pub raw: Decimal,
    pub weighted: Decimal,
    pub normalized: Decimal,
    pub score: Decimal,
}

// ---------------------------------------------------------------------------
// Stream session
// ---------------------------------------------------------------------------

/// When a stream session ends. Parsed once from `never`, `market`, or a count of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    Never,
    /// Stop once the local wall-clock hour reaches the market close.
    MarketHours,
    ElapsedSeconds(u64),
}

impl StopCondition {
    pub fn should_stop(&self, elapsed: Duration, local_hour: u32) -> bool {
        match *self {
            StopCondition::Never => false,
            StopCondition::MarketHours => local_hour >= MARKET_CLOSE_HOUR,
            StopCondition::ElapsedSeconds(secs) => elapsed >= Duration::from_secs(secs),
        }
    }
}

impl FromStr for StopCondition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(StopCondition::Never),
            "market" => Ok(StopCondition::MarketHours),
            _ => s.parse::<u64>().map(StopCondition::ElapsedSeconds).map_err(|_| {
                AppError::Config(format!(
                    "STOP_CONDITION must be 'never', 'market' or a number of seconds, got '{s}'"
                ))
            }),
        }
    }
}

impl std::fmt::Display for StopCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopCondition::Never => write!(f, "never"),
            StopCondition::MarketHours => write!(f, "market"),
            StopCondition::ElapsedSeconds(s) => write!(f, "{s}s"),
        }
    }
}

/// Handler verdict after an event or a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Authenticating = 0,
    ResolvingFollows = 1,
    Streaming = 2,
    Stopped = 3,
    Errored = 4,
}

impl SessionState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Authenticating,
            1 => SessionState::ResolvingFollows,
            2 => SessionState::Streaming,
            3 => SessionState::Stopped,
            _ => SessionState::Errored,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Errored)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Authenticating => "authenticating",
            SessionState::ResolvingFollows => "resolving_follows",
            SessionState::Streaming => "streaming",
            SessionState::Stopped => "stopped",
            SessionState::Errored => "errored",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_condition_parses_all_shapes() {
        assert_eq!("never".parse::<StopCondition>().unwrap(), StopCondition::Never);
        assert_eq!("Market".parse::<StopCondition>().unwrap(), StopCondition::MarketHours);
        assert_eq!(
            " 3600 ".parse::<StopCondition>().unwrap(),
            StopCondition::ElapsedSeconds(3600)
        );
        assert!("sometimes".parse::<StopCondition>().is_err());
        assert!("-5".parse::<StopCondition>().is_err());
    }

    #[test]
    fn elapsed_stop_is_inclusive_at_bound() {
        let cond = StopCondition::ElapsedSeconds(10);
        assert!(!cond.should_stop(Duration::from_secs_f64(9.9), 0));
        assert!(cond.should_stop(Duration::from_secs(10), 0));
    }

    #[test]
    fn market_stop_at_close_hour() {
        let cond = StopCondition::MarketHours;
        assert!(!cond.should_stop(Duration::ZERO, 15));
        assert!(cond.should_stop(Duration::ZERO, 16));
        assert!(cond.should_stop(Duration::ZERO, 23));
    }

    #[test]
    fn only_stopped_and_errored_are_terminal() {
        for v in 0..=4u8 {
            let state = SessionState::from_u8(v);
            assert_eq!(state as u8, v);
            assert_eq!(
                state.is_terminal(),
                matches!(state, SessionState::Stopped | SessionState::Errored)
            );
        }
        assert!(!SessionState::Streaming.is_terminal());
    }

    #[test]
    fn never_stops_never() {
        assert!(!StopCondition::Never.should_stop(Duration::from_secs(u64::MAX / 2), 23));
    }

    #[test]
    fn rename_sets_series_specific_column() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let vix = FinancialSeries::new(
            SeriesKind::Vix,
            vec![
                PricePoint { date: d("2020-01-03"), close: 14.0 },
                PricePoint { date: d("2020-01-02"), close: 12.5 },
            ],
        );
        assert_eq!(vix.column, "close");
        assert_eq!(vix.points[0].date, d("2020-01-02"));
        let vix = vix.renamed();
        assert_eq!(vix.column, "vix_close");
        assert_eq!(vix.points.len(), 2);
    }

    #[test]
    fn missing_sentiment_is_typed() {
        let post = Post {
            id: "1".to_string(),
            user_id: "u".to_string(),
            text: String::new(),
            created_at: None,
            flair: Some(0.4),
            lexicon: None,
            is_reply: false,
            is_retweet: false,
        };
        assert_eq!(post.require_sentiment(SentimentModel::Flair).unwrap(), 0.4);
        match post.require_sentiment(SentimentModel::Lexicon) {
            Err(AppError::MissingSentiment { post_id, model }) => {
                assert_eq!(post_id, "1");
                assert_eq!(model, SentimentModel::Lexicon);
            }
            other => panic!("expected MissingSentiment, got {other:?}"),
        }
    }
}
