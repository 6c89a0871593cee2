//! Row types matching `migrations/0001_init.sql`, decoded with `sqlx::FromRow`
//! and converted into the domain types the pipeline works on.

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::types::{Account, Post, PricePoint, SeriesKind};

#[derive(Debug, sqlx::FromRow)]
pub struct PriceRow {
    pub date: String,
    pub close: f64,
}

impl PriceRow {
    pub fn into_point(self, kind: SeriesKind) -> Result<PricePoint> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|e| {
            AppError::MalformedRow {
                table: kind.table(),
                reason: format!("bad date '{}': {e}", self.date),
            }
        })?;
        Ok(PricePoint {
            date,
            close: self.close,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TweetRow {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: Option<i64>,
    pub is_reply: i64,
    pub is_retweet: i64,
    pub flair: Option<f64>,
    pub lexicon: Option<f64>,
}

impl From<TweetRow> for Post {
    fn from(r: TweetRow) -> Self {
        Post {
            id: r.id,
            user_id: r.user_id,
            text: r.text,
            created_at: r.created_at,
            flair: r.flair,
            lexicon: r.lexicon,
            is_reply: r.is_reply != 0,
            is_retweet: r.is_retweet != 0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub screen_name: Option<String>,
    pub total_followers: i64,
}

impl TryFrom<UserRow> for Account {
    type Error = AppError;

    fn try_from(r: UserRow) -> Result<Self> {
        let followers = u64::try_from(r.total_followers).map_err(|_| AppError::MalformedRow {
            table: "users",
            reason: format!("negative follower count {} for {}", r.total_followers, r.id),
        })?;
        Ok(Account {
            id: r.id,
            screen_name: r.screen_name,
            followers,
        })
    }
}
