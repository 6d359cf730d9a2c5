use chrono::NaiveDate;
use database::Database;
use reddit_client::{RedditApiClient, RedditPostData};
use std::collections::HashSet;
use ticker_linker::TickerLinker;
use tickertalk_core::{
    ContentItem, CoreError, ForumRule, ScrapeConfig, ThreadKind, ThreadProgress,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub mod discovery;
pub mod filter;
pub mod stats;

pub use stats::RunStats;

/// Submissions pulled per listing during discovery.
const DISCOVERY_LISTING_LIMIT: u32 = 50;

/// Orchestrates one ingestion run: thread discovery, rate-limited
/// extraction, entity linking, and checkpointed batch persistence.
/// Threads are processed sequentially; only the linking step fans out,
/// and the caller must not overlap two runs against the same thread.
pub struct ScrapeService {
    api: RedditApiClient,
    db: Database,
    linker: TickerLinker,
    config: ScrapeConfig,
}

impl ScrapeService {
    pub fn new(
        api: RedditApiClient,
        db: Database,
        linker: TickerLinker,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            api,
            db,
            linker,
            config,
        }
    }

    /// Incremental mode: scrape new content from currently-active
    /// threads. Safe to re-run immediately; an unchanged upstream yields
    /// zero new items.
    pub async fn run_incremental(&self) -> Result<RunStats, CoreError> {
        let started = Instant::now();
        let mut stats = RunStats::default();

        for rule in self.config.enabled_forums() {
            let candidates = match self.discover_forum(rule).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(
                        subreddit = %rule.subreddit,
                        error = %e,
                        "Forum discovery failed, skipping forum for this run"
                    );
                    continue;
                }
            };
            stats.threads_discovered += candidates.len();

            for (post, kind) in candidates {
                let thread_id = post.id.clone();
                match self.scrape_thread(rule, &post, kind, false, &mut stats).await {
                    Ok(()) => stats.threads_processed += 1,
                    Err(e) => {
                        warn!(
                            thread_id = %thread_id,
                            subreddit = %rule.subreddit,
                            error = %e,
                            retryable = e.is_retryable(),
                            "Thread extraction failed, skipping for this run"
                        );
                        stats.threads_skipped += 1;
                    }
                }
            }
        }

        stats.duration = started.elapsed();
        info!("Incremental run finished: {}", stats);
        let limiter = self.api.rate_limiter().status().await;
        debug!(
            window_requests = limiter.window_requests,
            throttled_waits = limiter.throttled_waits,
            backoffs_taken = limiter.backoffs_taken,
            "Rate limiter after run"
        );
        Ok(stats)
    }

    /// Backfill mode: historical load over an inclusive date range, one
    /// day at a time. Days whose known threads are all complete are
    /// skipped without issuing a single fetch, so an interrupted backfill
    /// resumes where it stopped.
    pub async fn run_backfill(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RunStats, CoreError> {
        if start > end {
            return Err(CoreError::InvalidInput {
                message: format!("backfill range {} .. {} is inverted", start, end),
            });
        }

        let started = Instant::now();
        let mut stats = RunStats::default();

        for day in filter::backfill_days(start, end) {
            let (day_start, day_end) = filter::day_bounds_utc(day);

            for rule in self.config.enabled_forums() {
                let known = self
                    .db
                    .threads_created_between(&rule.subreddit, day_start, day_end)
                    .await?;
                if filter::day_already_complete(&known) {
                    info!(day = %day, subreddit = %rule.subreddit, "Day already complete, skipping");
                    stats.days_skipped += 1;
                    continue;
                }
                let complete_ids: HashSet<String> = known
                    .iter()
                    .filter(|t| t.is_complete)
                    .map(|t| t.reddit_id.clone())
                    .collect();

                let posts = match self
                    .api
                    .search_posts_by_range(&rule.subreddit, day_start, day_end)
                    .await
                {
                    Ok(posts) => posts,
                    Err(e) => {
                        warn!(
                            day = %day,
                            subreddit = %rule.subreddit,
                            error = %e,
                            "Historical discovery failed, skipping day for this run"
                        );
                        continue;
                    }
                };

                for post in posts {
                    let kind = discovery::classify_title(&post.title, &rule.discussion_keywords);
                    if !kind.is_discussion() || complete_ids.contains(&post.id) {
                        continue;
                    }
                    stats.threads_discovered += 1;
                    let thread_id = post.id.clone();
                    match self.scrape_thread(rule, &post, kind, true, &mut stats).await {
                        Ok(()) => {
                            self.db.mark_thread_complete(&thread_id).await?;
                            stats.threads_processed += 1;
                        }
                        Err(e) => {
                            warn!(
                                thread_id = %thread_id,
                                day = %day,
                                error = %e,
                                "Thread extraction failed, will retry on the next backfill"
                            );
                            stats.threads_skipped += 1;
                        }
                    }
                }
            }
        }

        stats.duration = started.elapsed();
        info!("Backfill run finished: {}", stats);
        Ok(stats)
    }

    /// Status mode: read-only report of all thread checkpoints.
    pub async fn status(&self) -> Result<Vec<ThreadProgress>, CoreError> {
        self.db.list_threads().await
    }

    async fn discover_forum(
        &self,
        rule: &ForumRule,
    ) -> Result<Vec<(RedditPostData, ThreadKind)>, CoreError> {
        let hot = self
            .api
            .get_hot_posts(&rule.subreddit, DISCOVERY_LISTING_LIMIT)
            .await?;
        let recent = self
            .api
            .get_new_posts(&rule.subreddit, DISCOVERY_LISTING_LIMIT, None)
            .await?;
        Ok(discovery::select_candidates(
            listing_posts(hot),
            listing_posts(recent),
            rule,
        ))
    }

    /// Extract one thread, link the new items, and commit them in
    /// checkpointed batches. `strict_id_filter` disables the
    /// low-water-mark shortcut; backfill cannot assume ordering and
    /// always dedups by stored ids.
    async fn scrape_thread(
        &self,
        rule: &ForumRule,
        post: &RedditPostData,
        kind: ThreadKind,
        strict_id_filter: bool,
        stats: &mut RunStats,
    ) -> Result<(), CoreError> {
        self.db
            .upsert_thread(&discovery::progress_from_post(post, kind))
            .await?;

        let comment_limit = rule.comment_limit(kind.is_discussion());
        let fetch = self
            .api
            .get_thread(&rule.subreddit, &post.id, comment_limit, self.config.max_expand)
            .await?;
        let reported_total = fetch.post.num_comments;

        let mut items: Vec<ContentItem> = Vec::with_capacity(fetch.comments.len() + 1);
        items.push(fetch.post.into_content_item());
        items.extend(
            fetch
                .comments
                .into_iter()
                .map(|comment| comment.into_content_item(&post.id)),
        );
        stats.items_seen += items.len();

        let low_water_mark = if strict_id_filter {
            None
        } else {
            self.db.latest_item_timestamp(&post.id).await?
        };
        let existing_ids = if low_water_mark.is_none() {
            self.db.existing_item_ids(&post.id).await?
        } else {
            HashSet::new()
        };
        let new_items = filter::filter_new_items(items, low_water_mark, &existing_ids);
        stats.items_new += new_items.len();
        if new_items.is_empty() {
            debug!(thread_id = %post.id, "No new content");
            return Ok(());
        }

        let linked = self
            .linker
            .link_all(new_items, self.config.link_workers)
            .await;
        for chunk in linked.chunks(self.config.batch_size) {
            let outcome = self.db.commit_batch(&post.id, reported_total, chunk).await?;
            stats.absorb_batch(&outcome);
        }

        info!(
            thread_id = %post.id,
            kind = kind.as_str(),
            new_items = linked.len(),
            "Thread scraped"
        );
        Ok(())
    }
}

fn listing_posts(
    listing: reddit_client::RedditListing<RedditPostData>,
) -> Vec<RedditPostData> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| child.data)
        .collect()
}
