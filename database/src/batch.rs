use crate::Database;
use chrono::Utc;
use tickertalk_core::{ContentItem, CoreError, DatabaseError, TickerLink};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub persisted: usize,
    pub skipped_duplicates: usize,
    pub links_created: usize,
}

impl Database {
    /// Commit one batch of items with their links, then advance the
    /// thread checkpoint, all in a single transaction. A crash between
    /// batches loses at most this batch and can never produce a
    /// duplicate on retry: an item whose external id already exists (a
    /// race against another writer or an imperfect dedup filter) is
    /// skipped per item, not treated as a batch-wide error.
    pub async fn commit_batch(
        &self,
        thread_id: &str,
        reported_total: i64,
        batch: &[(ContentItem, Vec<TickerLink>)],
    ) -> Result<BatchOutcome, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed {
                reason: e.to_string(),
            })?;

        let mut outcome = BatchOutcome::default();
        for (item, links) in batch {
            let inserted = sqlx::query(
                r#"
                INSERT INTO articles
                    (reddit_id, thread_id, kind, title, body, author, score,
                     num_replies, permalink, created_utc)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(reddit_id) DO NOTHING
                "#,
            )
            .bind(&item.reddit_id)
            .bind(&item.thread_id)
            .bind(item.kind.as_str())
            .bind(&item.title)
            .bind(&item.body)
            .bind(&item.author)
            .bind(item.score)
            .bind(item.num_replies)
            .bind(&item.permalink)
            .bind(item.created_utc)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Sql)?;

            if inserted.rows_affected() == 0 {
                outcome.skipped_duplicates += 1;
                continue;
            }
            let article_id = inserted.last_insert_rowid();

            for link in links {
                let written = sqlx::query(
                    r#"
                    INSERT INTO ticker_links
                        (article_id, symbol, confidence, matched_terms, reasoning)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(article_id)
                .bind(&link.symbol)
                .bind(link.confidence)
                .bind(serde_json::to_string(&link.matched_terms)?)
                .bind(&link.reasoning)
                .execute(&mut *tx)
                .await;
                match written {
                    Ok(_) => outcome.links_created += 1,
                    Err(e) => {
                        let err = CoreError::from(DatabaseError::Sql(e));
                        if !err.is_unique_violation() {
                            return Err(err);
                        }
                    }
                }
            }
            outcome.persisted += 1;
        }

        // Checkpoint in the same transaction as the items, so progress
        // and content can never diverge.
        sqlx::query(
            r#"
            UPDATE reddit_threads
            SET scraped_items = scraped_items + ?,
                total_items = MAX(total_items, ?),
                last_scraped_at = ?
            WHERE reddit_id = ?
            "#,
        )
        .bind(outcome.persisted as i64)
        .bind(reported_total)
        .bind(Utc::now().timestamp())
        .bind(thread_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Sql)?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed {
                reason: e.to_string(),
            })?;

        debug!(
            thread_id,
            persisted = outcome.persisted,
            skipped = outcome.skipped_duplicates,
            links = outcome.links_created,
            "Committed batch"
        );
        Ok(outcome)
    }
}
