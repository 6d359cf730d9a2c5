use reddit_client::RedditPostData;
use tickertalk_core::{ForumRule, ThreadKind, ThreadProgress};

/// Classify a submission title against a forum's discussion keywords
/// (case-insensitive). Anything that is not a recurring discussion
/// thread is an ordinary top post.
pub fn classify_title(title: &str, discussion_keywords: &[String]) -> ThreadKind {
    let lowered = title.to_lowercase();
    let is_discussion = discussion_keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()));
    if !is_discussion {
        ThreadKind::TopPost
    } else if lowered.contains("weekend") {
        ThreadKind::WeekendDiscussion
    } else {
        ThreadKind::DailyDiscussion
    }
}

/// Pick the threads to scrape this run. Stickied posts are inspected
/// first (discussion threads are normally pinned), then the recent
/// listing; discussion threads outrank ordinary top posts and the total
/// is capped per forum.
pub fn select_candidates(
    hot: Vec<RedditPostData>,
    recent: Vec<RedditPostData>,
    rule: &ForumRule,
) -> Vec<(RedditPostData, ThreadKind)> {
    let mut discussions: Vec<(RedditPostData, ThreadKind)> = Vec::new();
    let mut top_posts: Vec<(RedditPostData, ThreadKind)> = Vec::new();
    let mut seen_ids: Vec<String> = Vec::new();

    let stickied = hot.into_iter().filter(|p| p.stickied);
    for post in stickied.chain(recent.into_iter()) {
        if seen_ids.iter().any(|id| *id == post.id) {
            continue;
        }
        seen_ids.push(post.id.clone());
        let kind = classify_title(&post.title, &rule.discussion_keywords);
        if kind.is_discussion() {
            discussions.push((post, kind));
        } else {
            top_posts.push((post, kind));
        }
    }

    discussions
        .into_iter()
        .chain(top_posts.into_iter())
        .take(rule.max_posts_per_run as usize)
        .collect()
}

pub fn progress_from_post(post: &RedditPostData, kind: ThreadKind) -> ThreadProgress {
    ThreadProgress {
        reddit_id: post.id.clone(),
        title: post.title.clone(),
        subreddit: post.subreddit.clone(),
        kind,
        total_items: post.num_comments,
        scraped_items: 0,
        last_scraped_at: None,
        is_complete: false,
        created_utc: post.created_utc as i64,
    }
}
