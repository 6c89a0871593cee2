use chrono::DateTime;
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::warn;

use crate::config::MAX_PENDING_LINE_BYTES;
use crate::error::Result;
use crate::types::{Account, Post};

/// Author block embedded in every status.
#[derive(Debug, Deserialize, Clone)]
pub struct StatusUser {
    pub id_str: String,
    pub screen_name: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtendedTweet {
    pub full_text: String,
}

/// A status (tweet) as delivered by the filter stream.
/// Only the fields the originality filter and ingestion need are decoded.
#[derive(Debug, Deserialize, Clone)]
pub struct StatusEvent {
    pub id_str: String,
    #[serde(default)]
    pub text: String,
    pub extended_tweet: Option<ExtendedTweet>,
    pub user: Option<StatusUser>,
    /// Presence alone marks a retweet; the embedded status is never inspected.
    pub retweeted_status: Option<IgnoredAny>,
    pub in_reply_to_status_id: Option<u64>,
    pub in_reply_to_screen_name: Option<String>,
    pub in_reply_to_user_id: Option<u64>,
    /// e.g. "Wed Oct 10 20:19:24 +0000 2018"
    pub created_at: Option<String>,
    pub timestamp_ms: Option<String>,
}

impl StatusEvent {
    pub fn is_retweet(&self) -> bool {
        self.retweeted_status.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_status_id.is_some()
            || self.in_reply_to_screen_name.is_some()
            || self.in_reply_to_user_id.is_some()
    }

    /// Top-level post by its own author: neither a retweet nor any kind of reply.
    pub fn is_original(&self) -> bool {
        !self.is_retweet() && !self.is_reply()
    }

    /// Untruncated text when the stream carries an extended tweet.
    pub fn full_text(&self) -> &str {
        self.extended_tweet
            .as_ref()
            .map(|e| e.full_text.as_str())
            .unwrap_or(&self.text)
    }

    /// Creation time in unix seconds, from `created_at` or else `timestamp_ms`.
    pub fn created_at_unix(&self) -> Option<i64> {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y").ok())
            .map(|dt| dt.timestamp())
            .or_else(|| {
                self.timestamp_ms
                    .as_deref()
                    .and_then(|ms| ms.parse::<i64>().ok())
                    .map(|ms| ms / 1000)
            })
    }

    /// Unscored post row; None when the status carries no author.
    pub fn to_post(&self) -> Option<Post> {
        let user = self.user.as_ref()?;
        Some(Post {
            id: self.id_str.clone(),
            user_id: user.id_str.clone(),
            text: self.full_text().to_string(),
            created_at: self.created_at_unix(),
            flair: None,
            lexicon: None,
            is_reply: self.is_reply(),
            is_retweet: self.is_retweet(),
        })
    }

    pub fn to_account(&self) -> Option<Account> {
        let user = self.user.as_ref()?;
        Some(Account {
            id: user.id_str.clone(),
            screen_name: user.screen_name.clone(),
            followers: user.followers_count,
        })
    }
}

/// One decoded line of the filter stream.
#[derive(Debug)]
pub enum StreamMessage {
    Status(Box<StatusEvent>),
    /// Deletion notice for a previously delivered status.
    Delete { id: String },
    /// Count of statuses withheld because the filter matched more than the delivery cap.
    Limit { track: u64 },
    Disconnect { code: u64, reason: String },
    Warning { message: String },
    Unknown,
}

/// Decode one stream line. Fails only on invalid JSON or on a status that
/// does not match the expected shape.
pub fn parse_stream_message(raw: &str) -> Result<StreamMessage> {
    let value: serde_json::Value = serde_json::from_str(raw)?;

    if let Some(delete) = value.get("delete") {
        let id = delete
            .pointer("/status/id_str")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        return Ok(StreamMessage::Delete { id });
    }
    if let Some(limit) = value.get("limit") {
        let track = limit.get("track").and_then(|v| v.as_u64()).unwrap_or(0);
        return Ok(StreamMessage::Limit { track });
    }
    if let Some(disconnect) = value.get("disconnect") {
        return Ok(StreamMessage::Disconnect {
            code: disconnect.get("code").and_then(|v| v.as_u64()).unwrap_or(0),
            reason: disconnect
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        });
    }
    if let Some(warning) = value.get("warning") {
        return Ok(StreamMessage::Warning {
            message: warning
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        });
    }
    if value.get("id_str").is_some() && value.get("user").is_some() {
        let status: StatusEvent = serde_json::from_value(value)?;
        return Ok(StreamMessage::Status(Box::new(status)));
    }
    Ok(StreamMessage::Unknown)
}

/// Splits a chunked body into `\r\n`-delimited messages. Chunk boundaries
/// do not align with message boundaries, so partial lines are carried over.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_pending: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_LINE_BYTES)
    }
}

impl LineBuffer {
    /// Buffer that drops an unterminated message once it exceeds `max_pending` bytes.
    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_pending,
        }
    }

    /// Appends `chunk` and returns every line it completed, without terminators.
    /// Blank keep-alive lines are returned as empty strings.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(&['\r', '\n'][..]).to_string());
        }
        if self.buf.len() > self.max_pending {
            warn!(
                bytes = self.buf.len(),
                limit = self.max_pending,
                "discarding oversized unterminated stream message"
            );
            self.buf.clear();
        }
        lines
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
