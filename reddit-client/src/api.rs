use crate::auth::{AuthManager, RedditAuthConfig};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tickertalk_core::{ContentItem, ContentKind, CoreError, RedditApiError};
use tokio::time::sleep;
use tracing::{debug, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone)]
pub struct RedditCommentData {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: i64,
    pub permalink: String,
}

/// One submission with its unfolded reply tree. `more_skipped` counts
/// collapsed "load more" stubs left unexpanded under the depth budget.
#[derive(Debug, Clone)]
pub struct ThreadFetch {
    pub post: RedditPostData,
    pub comments: Vec<RedditCommentData>,
    pub more_skipped: u32,
}

impl RedditPostData {
    /// Provider-global external id (listing fullname form).
    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }

    pub fn into_content_item(self) -> ContentItem {
        ContentItem {
            reddit_id: self.fullname(),
            thread_id: self.id,
            kind: ContentKind::Post,
            title: Some(self.title),
            body: self.selftext,
            author: self.author,
            score: self.score,
            num_replies: self.num_comments,
            permalink: self.permalink,
            created_utc: self.created_utc as i64,
        }
    }
}

impl RedditCommentData {
    pub fn fullname(&self) -> String {
        format!("t1_{}", self.id)
    }

    pub fn into_content_item(self, thread_id: &str) -> ContentItem {
        ContentItem {
            reddit_id: self.fullname(),
            thread_id: thread_id.to_string(),
            kind: ContentKind::Comment,
            title: None,
            body: self.body,
            author: self.author,
            score: self.score,
            num_replies: 0,
            permalink: self.permalink,
            created_utc: self.created_utc,
        }
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    auth: AuthManager,
    rate_limiter: Arc<RateLimiter>,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(auth_config: RedditAuthConfig) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth()));
        let http_client = Client::builder()
            .user_agent(&auth_config.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            auth: AuthManager::new(&auth_config),
            rate_limiter,
            user_agent: auth_config.user_agent,
        }
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.rate_limiter)
    }

    /// Issue one request through the limiter, absorbing provider
    /// over-limit rejections with the backoff ladder. Quota exhaustion
    /// surfaces as `QuotaExhausted`; the orchestrator abandons the
    /// affected thread for the run, never the process.
    async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);
        let mut attempt: u32 = 1;

        loop {
            self.rate_limiter.admit().await;
            let access_token = self.auth.access_token().await?;

            let mut request_builder = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&access_token)
                .header("User-Agent", &self.user_agent);
            if let Some(params) = query_params {
                request_builder = request_builder.query(params);
            }

            debug!("Reddit API request: {} {} (attempt {})", method, endpoint, attempt);
            let response = match request_builder.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                }
                Err(e) => return Err(CoreError::Network(e)),
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let provider_message = rate_limit_message(response).await;
                let decision = self.rate_limiter.on_rate_limited(&provider_message, attempt);
                if !decision.retry {
                    warn!(
                        endpoint,
                        attempts = attempt,
                        "Quota retries exhausted, abandoning request"
                    );
                    return Err(CoreError::RedditApi(RedditApiError::QuotaExhausted {
                        attempts: attempt,
                    }));
                }
                warn!(
                    endpoint,
                    attempt,
                    wait_s = decision.wait.as_secs(),
                    "Provider over-limit, backing off"
                );
                sleep(decision.wait).await;
                attempt += 1;
                continue;
            }

            return Err(map_status_error(status, endpoint));
        }
    }

    /// Recent submissions in a forum, newest first.
    pub async fn get_new_posts(
        &self,
        subreddit: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let limit_str = limit.to_string();
        let mut params = vec![("limit", limit_str.as_str()), ("raw_json", "1")];
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }

        let response = self
            .make_request(Method::GET, &endpoint, Some(&params))
            .await?;
        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|_| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("failed to parse new listing for r/{}", subreddit),
            })
        })?;

        debug!(
            "Retrieved {} new posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }

    /// Front-of-forum listing; stickied discussion threads surface here.
    pub async fn get_hot_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/hot", subreddit);
        let limit_str = limit.to_string();
        let params = [("limit", limit_str.as_str()), ("raw_json", "1")];

        let response = self
            .make_request(Method::GET, &endpoint, Some(&params))
            .await?;
        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|_| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("failed to parse hot listing for r/{}", subreddit),
            })
        })?;
        Ok(listing)
    }

    /// Submissions created inside [start_utc, end_utc), via the
    /// timestamp-range search syntax. Historical threads are no longer in
    /// the recent listings, so backfill discovery has to search.
    pub async fn search_posts_by_range(
        &self,
        subreddit: &str,
        start_utc: i64,
        end_utc: i64,
    ) -> Result<Vec<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/search", subreddit);
        let query = format!("timestamp:{}..{}", start_utc, end_utc);
        let limit_str = SEARCH_PAGE_SIZE.to_string();
        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("syntax", "cloudsearch"),
                ("restrict_sr", "on"),
                ("sort", "new"),
                ("limit", limit_str.as_str()),
                ("raw_json", "1"),
            ];
            if let Some(ref cursor) = after {
                params.push(("after", cursor.as_str()));
            }

            let response = self
                .make_request(Method::GET, &endpoint, Some(&params))
                .await?;
            let listing: RedditListing<RedditPostData> = response.json().await.map_err(|_| {
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("failed to parse search results for r/{}", subreddit),
                })
            })?;

            let page_len = listing.data.children.len();
            posts.extend(
                listing
                    .data
                    .children
                    .into_iter()
                    .map(|child| child.data)
                    .filter(|post| {
                        let created = post.created_utc as i64;
                        created >= start_utc && created < end_utc
                    }),
            );

            after = listing.data.after;
            if after.is_none() || page_len == 0 {
                break;
            }
        }

        info!(
            "Found {} posts in r/{} for range {}..{}",
            posts.len(),
            subreddit,
            start_utc,
            end_utc
        );
        Ok(posts)
    }

    /// One submission with its reply tree unfolded up to `max_expand`
    /// levels. Unlimited depth is available but discouraged for very
    /// large threads.
    pub async fn get_thread(
        &self,
        subreddit: &str,
        thread_id: &str,
        comment_limit: u32,
        max_expand: Option<u32>,
    ) -> Result<ThreadFetch, CoreError> {
        let endpoint = format!("/r/{}/comments/{}", subreddit, thread_id);
        let limit_str = comment_limit.to_string();
        let depth_str = max_expand.map(|d| d.to_string());
        let mut params = vec![
            ("limit", limit_str.as_str()),
            ("sort", "new"),
            ("raw_json", "1"),
        ];
        if let Some(ref depth) = depth_str {
            params.push(("depth", depth.as_str()));
        }

        let response = self
            .make_request(Method::GET, &endpoint, Some(&params))
            .await?;
        let payload: Value = response.json().await.map_err(|_| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("failed to parse comment tree for {}", thread_id),
            })
        })?;

        let fetch = parse_thread(&payload).map_err(CoreError::RedditApi)?;
        debug!(
            thread_id,
            comments = fetch.comments.len(),
            more_skipped = fetch.more_skipped,
            "Fetched thread content"
        );
        Ok(fetch)
    }
}

async fn rate_limit_message(response: Response) -> String {
    let header_hint = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(|v| format!("retry after {} seconds", v));
    match header_hint {
        Some(hint) => hint,
        None => response.text().await.unwrap_or_default(),
    }
}

fn map_status_error(status: StatusCode, endpoint: &str) -> CoreError {
    let error = match status {
        StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        StatusCode::NOT_FOUND => {
            if endpoint.contains("/comments/") {
                let thread_id = endpoint
                    .rsplit('/')
                    .next()
                    .unwrap_or(endpoint)
                    .to_string();
                RedditApiError::ThreadNotFound { thread_id }
            } else {
                let subreddit = endpoint
                    .trim_start_matches("/r/")
                    .split('/')
                    .next()
                    .unwrap_or(endpoint)
                    .to_string();
                RedditApiError::SubredditNotFound { subreddit }
            }
        }
        s if s.is_server_error() => RedditApiError::ServerError {
            status_code: s.as_u16(),
        },
        s => RedditApiError::InvalidResponse {
            details: format!("unexpected status {} for {}", s, endpoint),
        },
    };
    CoreError::RedditApi(error)
}

/// The comments endpoint replies with a two-element array: the post
/// listing and the comment listing. Nested `replies` are either an empty
/// string or another listing, so the tree is walked dynamically.
fn parse_thread(payload: &Value) -> Result<ThreadFetch, RedditApiError> {
    let listings = payload
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| RedditApiError::InvalidResponse {
            details: "comment tree payload is not a two-listing array".to_string(),
        })?;

    let post_value = &listings[0]["data"]["children"][0]["data"];
    let post: RedditPostData =
        serde_json::from_value(post_value.clone()).map_err(|e| RedditApiError::InvalidResponse {
            details: format!("malformed submission data: {}", e),
        })?;

    let mut comments = Vec::new();
    let mut more_skipped = 0u32;
    collect_comments(&listings[1], &mut comments, &mut more_skipped);

    Ok(ThreadFetch {
        post,
        comments,
        more_skipped,
    })
}

fn collect_comments(listing: &Value, out: &mut Vec<RedditCommentData>, more_skipped: &mut u32) {
    let Some(children) = listing["data"]["children"].as_array() else {
        return;
    };

    for child in children {
        match child["kind"].as_str() {
            Some("t1") => {
                let data = &child["data"];
                let Some(id) = data["id"].as_str() else {
                    continue;
                };
                let body = data["body"].as_str().unwrap_or_default();
                // Deleted/removed comments keep their ids but carry no text.
                if !body.is_empty() && body != "[deleted]" && body != "[removed]" {
                    out.push(RedditCommentData {
                        id: id.to_string(),
                        author: data["author"].as_str().unwrap_or("[unknown]").to_string(),
                        body: body.to_string(),
                        score: data["score"].as_i64().unwrap_or(0),
                        created_utc: data["created_utc"].as_f64().unwrap_or(0.0) as i64,
                        permalink: data["permalink"].as_str().unwrap_or_default().to_string(),
                    });
                }
                let replies = &data["replies"];
                if replies.is_object() {
                    collect_comments(replies, out, more_skipped);
                }
            }
            Some("more") => {
                *more_skipped += child["data"]["children"]
                    .as_array()
                    .map(|a| a.len() as u32)
                    .unwrap_or(0);
            }
            _ => {}
        }
    }
}
