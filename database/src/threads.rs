use crate::Database;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashSet;
use tickertalk_core::{CoreError, DatabaseError, ThreadKind, ThreadProgress};

fn row_to_thread(row: &SqliteRow) -> Result<ThreadProgress, DatabaseError> {
    let kind_raw: String = row.try_get("kind")?;
    let kind = ThreadKind::parse(&kind_raw).ok_or_else(|| DatabaseError::ConstraintViolation {
        constraint: format!("reddit_threads.kind value {:?}", kind_raw),
    })?;
    Ok(ThreadProgress {
        reddit_id: row.try_get("reddit_id")?,
        title: row.try_get("title")?,
        subreddit: row.try_get("subreddit")?,
        kind,
        total_items: row.try_get("total_items")?,
        scraped_items: row.try_get("scraped_items")?,
        last_scraped_at: row.try_get("last_scraped_at")?,
        is_complete: row.try_get("is_complete")?,
        created_utc: row.try_get("created_utc")?,
    })
}

impl Database {
    /// Record a discovered thread. Re-discovery refreshes the title and
    /// the provider-reported item count; the scrape checkpoint fields are
    /// owned by `commit_batch` and never touched here.
    pub async fn upsert_thread(&self, progress: &ThreadProgress) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO reddit_threads
                (reddit_id, title, subreddit, kind, total_items, scraped_items,
                 last_scraped_at, is_complete, created_utc)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(reddit_id) DO UPDATE SET
                title = excluded.title,
                total_items = MAX(total_items, excluded.total_items)
            "#,
        )
        .bind(&progress.reddit_id)
        .bind(&progress.title)
        .bind(&progress.subreddit)
        .bind(progress.kind.as_str())
        .bind(progress.total_items)
        .bind(progress.scraped_items)
        .bind(progress.last_scraped_at)
        .bind(progress.is_complete)
        .bind(progress.created_utc)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(())
    }

    pub async fn get_thread(&self, reddit_id: &str) -> Result<Option<ThreadProgress>, CoreError> {
        let row = sqlx::query("SELECT * FROM reddit_threads WHERE reddit_id = ?")
            .bind(reddit_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        match row {
            Some(row) => Ok(Some(row_to_thread(&row)?)),
            None => Ok(None),
        }
    }

    /// All checkpoints, newest thread first. Read-only; used by status
    /// mode.
    pub async fn list_threads(&self) -> Result<Vec<ThreadProgress>, CoreError> {
        let rows = sqlx::query("SELECT * FROM reddit_threads ORDER BY created_utc DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        rows.iter()
            .map(|row| row_to_thread(row).map_err(CoreError::from))
            .collect()
    }

    /// Low-water mark: the newest creation timestamp among stored items
    /// of the thread. `None` means first contact and forces the id-set
    /// dedup path.
    pub async fn latest_item_timestamp(&self, thread_id: &str) -> Result<Option<i64>, CoreError> {
        let mark: Option<i64> =
            sqlx::query_scalar("SELECT MAX(created_utc) FROM articles WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::Sql)?;
        Ok(mark)
    }

    /// External ids already stored for a thread, for pure idempotent
    /// dedup when no low-water mark exists.
    pub async fn existing_item_ids(&self, thread_id: &str) -> Result<HashSet<String>, CoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT reddit_id FROM articles WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_all(&self.pool)
                .await
                .map_err(DatabaseError::Sql)?;
        Ok(ids.into_iter().collect())
    }

    /// Mark a thread fully extracted; backfill skips complete threads on
    /// resume.
    pub async fn mark_thread_complete(&self, reddit_id: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE reddit_threads SET is_complete = 1 WHERE reddit_id = ?")
            .bind(reddit_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        Ok(())
    }

    /// Threads of one forum created inside [start_utc, end_utc).
    pub async fn threads_created_between(
        &self,
        subreddit: &str,
        start_utc: i64,
        end_utc: i64,
    ) -> Result<Vec<ThreadProgress>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reddit_threads
            WHERE subreddit = ? AND created_utc >= ? AND created_utc < ?
            ORDER BY created_utc ASC
            "#,
        )
        .bind(subreddit)
        .bind(start_utc)
        .bind(end_utc)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        rows.iter()
            .map(|row| row_to_thread(row).map_err(CoreError::from))
            .collect()
    }
}
