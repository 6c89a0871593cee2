use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::db::models::{PriceRow, TweetRow, UserRow};
use crate::error::Result;
use crate::types::{Account, FinancialSeries, Post, SentimentModel, SeriesKind};

const TWEET_COLUMNS: &str =
    "id, user_id, text, created_at, is_reply, is_retweet, flair, lexicon";

/// Fixed queries over the SQLite store: index closes, posts and accounts.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Opens (creating if missing) the database file and applies migrations.
    pub async fn connect(db_path: impl AsRef<Path>) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let repo = Self { pool };
        repo.migrate().await?;
        info!("Database ready at {}", db_path.as_ref().display());
        Ok(repo)
    }

    /// Single-connection in-memory store; each connection would otherwise get its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetches one index series with its generic `close` column.
    pub async fn fetch_series(&self, kind: SeriesKind) -> Result<FinancialSeries> {
        let sql = format!("SELECT date, close FROM {} ORDER BY date", kind.table());
        let rows: Vec<PriceRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        let points = rows
            .into_iter()
            .map(|r| r.into_point(kind))
            .collect::<Result<Vec<_>>>()?;
        debug!(series = %kind, rows = points.len(), "fetched series");
        Ok(FinancialSeries::new(kind, points))
    }

    pub async fn fetch_vix(&self) -> Result<FinancialSeries> {
        self.fetch_series(SeriesKind::Vix).await
    }

    pub async fn fetch_spx(&self) -> Result<FinancialSeries> {
        self.fetch_series(SeriesKind::Spx).await
    }

    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets ORDER BY created_at, id");
        let rows: Vec<TweetRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Posts that have not yet been scored by `model`.
    pub async fn fetch_unscored_posts(&self, model: SentimentModel) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets WHERE {} IS NULL ORDER BY created_at, id",
            model.column()
        );
        let rows: Vec<TweetRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    pub async fn fetch_accounts(&self) -> Result<Vec<Account>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT id, screen_name, total_followers FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Account::try_from).collect()
    }

    /// All four inputs of the pipeline in one call.
    pub async fn fetch_data(
        &self,
    ) -> Result<(FinancialSeries, FinancialSeries, Vec<Post>, Vec<Account>)> {
        let vix = self.fetch_vix().await?;
        let spx = self.fetch_spx().await?;
        let posts = self.fetch_posts().await?;
        let accounts = self.fetch_accounts().await?;
        info!(
            vix = vix.points.len(),
            spx = spx.points.len(),
            posts = posts.len(),
            accounts = accounts.len(),
            "Fetched pipeline inputs"
        );
        Ok((vix, spx, posts, accounts))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn save_sentiment(
        &self,
        post_id: &str,
        model: SentimentModel,
        score: f64,
    ) -> Result<()> {
        let sql = format!("UPDATE tweets SET {} = ? WHERE id = ?", model.column());
        sqlx::query(&sql)
            .bind(score)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a post, leaving any existing row (and its scores) untouched.
    /// Returns whether a new row was written.
    pub async fn insert_post(&self, post: &Post) -> Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT OR IGNORE INTO tweets (id, user_id, text, created_at, is_reply, is_retweet, flair, lexicon)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.text)
        .bind(post.created_at)
        .bind(i64::from(post.is_reply))
        .bind(i64::from(post.is_retweet))
        .bind(post.flair)
        .bind(post.lexicon)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Inserts or refreshes an account. Follower counts only move forward in time.
    pub async fn upsert_account(&self, account: &Account, observed_at: i64) -> Result<()> {
        let followers = i64::try_from(account.followers).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            INSERT INTO users (id, screen_name, total_followers, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                screen_name = COALESCE(excluded.screen_name, users.screen_name),
                total_followers = excluded.total_followers,
                updated_at = excluded.updated_at
            WHERE excluded.updated_at >= users.updated_at
            "#,
        )
        .bind(&account.id)
        .bind(&account.screen_name)
        .bind(followers)
        .bind(observed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Index closes are loaded outside this crate; tests seed them here.
    #[cfg(test)]
    pub(crate) async fn insert_price(
        &self,
        kind: SeriesKind,
        point: &crate::types::PricePoint,
    ) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} (date, close) VALUES (?, ?)",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(point.date.format("%Y-%m-%d").to_string())
            .bind(point.close)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::AppError;
    use crate::types::PricePoint;

    pub(crate) fn post(id: &str, user_id: &str, flair: Option<f64>) -> Post {
        Post {
            id: id.to_string(),
            user_id: user_id.to_string(),
            text: format!("post {id}"),
            created_at: Some(1_600_000_000),
            flair,
            lexicon: None,
            is_reply: false,
            is_retweet: false,
        }
    }

    fn account(id: &str, followers: u64) -> Account {
        Account {
            id: id.to_string(),
            screen_name: Some(format!("handle_{id}")),
            followers,
        }
    }

    #[tokio::test]
    async fn series_come_back_sorted_with_generic_column() {
        let repo = Repository::in_memory().await.unwrap();
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        repo.insert_price(SeriesKind::Vix, &PricePoint { date: d("2020-03-17"), close: 75.9 })
            .await
            .unwrap();
        repo.insert_price(SeriesKind::Vix, &PricePoint { date: d("2020-03-16"), close: 82.7 })
            .await
            .unwrap();

        let vix = repo.fetch_vix().await.unwrap();
        assert_eq!(vix.column, "close");
        assert_eq!(vix.points.len(), 2);
        assert_eq!(vix.points[0].date, d("2020-03-16"));
        assert!(repo.fetch_spx().await.unwrap().points.is_empty());
    }

    #[tokio::test]
    async fn insert_post_keeps_existing_scores() {
        let repo = Repository::in_memory().await.unwrap();
        assert!(repo.insert_post(&post("1", "a", None)).await.unwrap());
        repo.save_sentiment("1", SentimentModel::Flair, 0.7).await.unwrap();

        assert!(!repo.insert_post(&post("1", "a", None)).await.unwrap());
        let posts = repo.fetch_posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].flair, Some(0.7));
        assert!(repo
            .fetch_unscored_posts(SentimentModel::Flair)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.fetch_unscored_posts(SentimentModel::Lexicon)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn upsert_account_ignores_stale_observations() {
        let repo = Repository::in_memory().await.unwrap();
        repo.upsert_account(&account("a", 100), 10).await.unwrap();
        repo.upsert_account(&account("a", 50), 5).await.unwrap();
        repo.upsert_account(&account("b", 7), 1).await.unwrap();

        let accounts = repo.fetch_accounts().await.unwrap();
        assert_eq!(accounts, vec![account("a", 100), account("b", 7)]);

        repo.upsert_account(&account("a", 150), 20).await.unwrap();
        assert_eq!(repo.fetch_accounts().await.unwrap()[0].followers, 150);
    }

    #[tokio::test]
    async fn malformed_price_date_is_typed() {
        let repo = Repository::in_memory().await.unwrap();
        sqlx::query("INSERT INTO spx (date, close) VALUES ('03/16/2020', 2386.13)")
            .execute(&repo.pool)
            .await
            .unwrap();
        match repo.fetch_spx().await {
            Err(AppError::MalformedRow { table, .. }) => assert_eq!(table, "spx"),
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }
}
