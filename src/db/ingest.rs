use std::path::Path;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::db::Repository;
use crate::error::Result;
use crate::stream::messages::{parse_stream_message, StreamMessage};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub lines: u64,
    pub inserted: u64,
    pub duplicates: u64,
    /// Control messages, non-original statuses and statuses without an author.
    pub skipped: u64,
    pub parse_failures: u64,
}

/// Loads a listener output file (one raw status per line) into the store.
/// Posts land unscored; authors are upserted with the follower count carried
/// by the status, stamped with the status's creation time.
pub async fn ingest_stream_file(repo: &Repository, path: impl AsRef<Path>) -> Result<IngestStats> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut stats = IngestStats::default();
    let now = chrono::Utc::now().timestamp();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;

        let status = match parse_stream_message(line) {
            Ok(StreamMessage::Status(status)) => status,
            Ok(_) => {
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                stats.parse_failures += 1;
                let count = stats.parse_failures;
                if count <= 10 || count % 1000 == 0 {
                    warn!(line = stats.lines, count, error = %e, "unparseable line");
                }
                continue;
            }
        };

        if !status.is_original() {
            stats.skipped += 1;
            continue;
        }
        let (Some(post), Some(account)) = (status.to_post(), status.to_account()) else {
            stats.skipped += 1;
            continue;
        };

        repo.upsert_account(&account, post.created_at.unwrap_or(now))
            .await?;
        if repo.insert_post(&post).await? {
            stats.inserted += 1;
        } else {
            stats.duplicates += 1;
        }
    }

    info!(
        path = %path.display(),
        lines = stats.lines,
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        parse_failures = stats.parse_failures,
        "ingest complete"
    );
    Ok(stats)
}
