use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tickertalk_core::{CoreError, DatabaseError};
use tracing::info;

mod batch;
mod threads;
mod tickers;


pub use batch::BatchOutcome;

/// Handle over the ingestion store. All mutation happens through
/// batch-scoped transactions; no lock is ever held across a network call.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet. Safe to run on every
    /// startup.
    pub async fn migrate(&self) -> Result<(), CoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS reddit_threads (
                reddit_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                subreddit TEXT NOT NULL,
                kind TEXT NOT NULL,
                total_items INTEGER NOT NULL DEFAULT 0,
                scraped_items INTEGER NOT NULL DEFAULT 0,
                last_scraped_at INTEGER,
                is_complete INTEGER NOT NULL DEFAULT 0,
                created_utc INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                reddit_id TEXT UNIQUE NOT NULL,
                thread_id TEXT NOT NULL REFERENCES reddit_threads(reddit_id),
                kind TEXT NOT NULL,
                title TEXT,
                body TEXT NOT NULL,
                author TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                num_replies INTEGER NOT NULL DEFAULT 0,
                permalink TEXT NOT NULL,
                created_utc INTEGER NOT NULL,
                sentiment REAL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ticker_links (
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                symbol TEXT NOT NULL,
                confidence REAL NOT NULL,
                matched_terms TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                PRIMARY KEY (article_id, symbol)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tickers (
                symbol TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                aliases TEXT NOT NULL,
                positive_keywords TEXT NOT NULL,
                negative_keywords TEXT NOT NULL,
                industry_keywords TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_articles_thread ON articles(thread_id, created_utc)",
            "CREATE INDEX IF NOT EXISTS idx_ticker_links_symbol ON ticker_links(symbol)",
            "CREATE INDEX IF NOT EXISTS idx_threads_subreddit ON reddit_threads(subreddit, created_utc)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationFailed {
                    details: e.to_string(),
                })?;
        }

        info!("Database schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
