use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tickertalk_core::LinkerError;
use tracing::{debug, warn};
use url::Url;

pub(crate) const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const MAX_FETCH_BYTES: usize = 512 * 1024;

const SOURCE_BASE_URL: &str = "https://www.reddit.com";

/// Content-bearing selectors tried in order; the first one that yields
/// text wins. Navigation, scripts, and ad chrome never match these.
const CONTENT_SELECTORS: &[&str] = &["article p", "main p", "div[role=main] p", "p"];

/// Fetches and extracts readable body text from an item's permalink.
/// Failures of any kind degrade to `None`; the linker then proceeds with
/// whatever stored text it already has.
#[derive(Debug)]
pub struct ContentFetcher {
    http_client: Client,
}

impl ContentFetcher {
    pub fn new(user_agent: &str) -> Self {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self { http_client }
    }

    pub async fn fetch_text(&self, permalink: &str) -> Option<String> {
        let url = absolute_url(permalink)?;
        match self.try_fetch(&url).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Fetched {} chars of content from {}", text.len(), url);
                Some(text)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Content fetch degraded to stored text for {}: {}", url, e);
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<String, LinkerError> {
        let response =
            self.http_client
                .get(url)
                .send()
                .await
                .map_err(|e| LinkerError::FetchFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(LinkerError::FetchFailed {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.is_empty() && !content_type.contains("html") {
            return Err(LinkerError::UnsupportedContent { content_type });
        }

        if let Some(length) = response.content_length() {
            if length as usize > MAX_FETCH_BYTES {
                return Err(LinkerError::OversizedContent {
                    limit_bytes: MAX_FETCH_BYTES,
                });
            }
        }

        let bytes = response.bytes().await.map_err(|e| LinkerError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let capped = &bytes[..bytes.len().min(MAX_FETCH_BYTES)];
        let html = String::from_utf8_lossy(capped);
        Ok(extract_text(&html))
    }
}

/// Permalinks arrive site-relative from the API; absolute URLs pass
/// through unchanged.
pub(crate) fn absolute_url(permalink: &str) -> Option<String> {
    if permalink.is_empty() {
        return None;
    }
    let candidate = if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{}{}", SOURCE_BASE_URL, permalink)
    };
    Url::parse(&candidate).ok().map(|u| u.to_string())
}

pub(crate) fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let mut parts: Vec<String> = Vec::new();
        for element in document.select(&selector) {
            let text: String = element.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                parts.push(text);
            }
        }
        if !parts.is_empty() {
            return parts.join("\n");
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_permalinks_become_absolute() {
        assert_eq!(
            absolute_url("/r/wallstreetbets/comments/abc/post/").as_deref(),
            Some("https://www.reddit.com/r/wallstreetbets/comments/abc/post/")
        );
        assert_eq!(
            absolute_url("https://example.com/page").as_deref(),
            Some("https://example.com/page")
        );
        assert_eq!(absolute_url(""), None);
    }

    #[test]
    fn extracts_paragraph_text_and_skips_chrome() {
        let html = r#"
            <html><head><script>var ads = true;</script></head>
            <body>
                <nav><a href="/">Home</a><a href="/hot">Hot</a></nav>
                <article>
                    <p>Visa Inc reported strong   earnings.</p>
                    <p>Shares rose after hours.</p>
                </article>
                <footer>© example</footer>
            </body></html>
        "#;
        let text = extract_text(html);
        assert_eq!(text, "Visa Inc reported strong earnings.\nShares rose after hours.");
        assert!(!text.contains("Home"));
        assert!(!text.contains("ads"));
    }

    #[test]
    fn falls_back_to_bare_paragraphs() {
        let html = "<html><body><div><p>just a plain page</p></div></body></html>";
        assert_eq!(extract_text(html), "just a plain page");
    }

    #[test]
    fn empty_document_extracts_nothing() {
        assert_eq!(extract_text("<html><body><nav>menu</nav></body></html>"), "");
    }
}
