use serde::{Deserialize, Serialize};

/// Source kind of a scraped item. Posts carry a title and selftext,
/// comments carry a body only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Comment => "comment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "post" => Some(ContentKind::Post),
            "comment" => Some(ContentKind::Comment),
            _ => None,
        }
    }
}

/// The atomic unit of ingestion. The provider-assigned `reddit_id` is the
/// sole idempotency key; rows are written once and never mutated by the
/// ingestion core.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub reddit_id: String,
    pub thread_id: String,
    pub kind: ContentKind,
    pub title: Option<String>,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub num_replies: i64,
    pub permalink: String,
    pub created_utc: i64,
}

impl ContentItem {
    /// Combined text used for entity linking.
    pub fn text(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => format!("{}\n{}", title, self.body),
            _ => self.body.clone(),
        }
    }
}

/// Classification of a discovered thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadKind {
    DailyDiscussion,
    WeekendDiscussion,
    TopPost,
}

impl ThreadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadKind::DailyDiscussion => "daily",
            ThreadKind::WeekendDiscussion => "weekend",
            ThreadKind::TopPost => "top",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(ThreadKind::DailyDiscussion),
            "weekend" => Some(ThreadKind::WeekendDiscussion),
            "top" => Some(ThreadKind::TopPost),
            _ => None,
        }
    }

    pub fn is_discussion(&self) -> bool {
        matches!(
            self,
            ThreadKind::DailyDiscussion | ThreadKind::WeekendDiscussion
        )
    }
}

/// Scrape checkpoint for one thread. `scraped_items` is monotonically
/// non-decreasing for the lifetime of the row.
#[derive(Debug, Clone)]
pub struct ThreadProgress {
    pub reddit_id: String,
    pub title: String,
    pub subreddit: String,
    pub kind: ThreadKind,
    pub total_items: i64,
    pub scraped_items: i64,
    pub last_scraped_at: Option<i64>,
    pub is_complete: bool,
    pub created_utc: i64,
}

/// Read-only reference data for one ticker symbol, seeded outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerReference {
    pub symbol: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub industry_keywords: Vec<String>,
}

/// A surviving (above-threshold) candidate produced by the linker,
/// persisted alongside its content item in the same batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerLink {
    pub symbol: String,
    pub confidence: f64,
    pub matched_terms: Vec<String>,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_kind_round_trips() {
        assert_eq!(ContentKind::parse("post"), Some(ContentKind::Post));
        assert_eq!(ContentKind::parse("comment"), Some(ContentKind::Comment));
        assert_eq!(ContentKind::parse("link"), None);
        assert_eq!(ContentKind::Comment.as_str(), "comment");
    }

    #[test]
    fn thread_kind_round_trips() {
        for kind in [
            ThreadKind::DailyDiscussion,
            ThreadKind::WeekendDiscussion,
            ThreadKind::TopPost,
        ] {
            assert_eq!(ThreadKind::parse(kind.as_str()), Some(kind));
        }
        assert!(ThreadKind::DailyDiscussion.is_discussion());
        assert!(!ThreadKind::TopPost.is_discussion());
    }

    #[test]
    fn item_text_includes_title_when_present() {
        let item = ContentItem {
            reddit_id: "t3_abc".to_string(),
            thread_id: "abc".to_string(),
            kind: ContentKind::Post,
            title: Some("Daily Discussion Thread".to_string()),
            body: "What are your moves today?".to_string(),
            author: "automod".to_string(),
            score: 100,
            num_replies: 2500,
            permalink: "/r/wallstreetbets/comments/abc".to_string(),
            created_utc: 1_700_000_000,
        };
        assert!(item.text().starts_with("Daily Discussion Thread\n"));
        assert!(item.text().ends_with("today?"));
    }
}
