use crate::context::{confidence_threshold, ContextAnalyzer};
use crate::fetch::ContentFetcher;
use futures::stream::{self, StreamExt};
use tickertalk_core::{ContentItem, TickerLink, TickerReference};
use tracing::debug;

/// Stored text shorter than this (after trimming) triggers the permalink
/// content-fetch fallback.
pub(crate) const MIN_BODY_CHARS: usize = 25;

/// Resolves raw content text into above-threshold ticker links. The
/// reference set is read-only; linking items in parallel shares nothing
/// mutable.
pub struct TickerLinker {
    analyzer: ContextAnalyzer,
    fetcher: Option<ContentFetcher>,
}

impl TickerLinker {
    pub fn new(references: Vec<TickerReference>) -> Self {
        Self {
            analyzer: ContextAnalyzer::new(references),
            fetcher: None,
        }
    }

    pub fn with_content_fetch(mut self, fetcher: ContentFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn ticker_count(&self) -> usize {
        self.analyzer.references().count()
    }

    /// Link one content item, fetching permalink content first when the
    /// stored text is too short to judge. Fetched text only ever adds
    /// signal; fetch failure falls back to the stored text alone.
    pub async fn link(&self, item: &ContentItem) -> Vec<TickerLink> {
        let mut text = item.text();
        if text.trim().chars().count() < MIN_BODY_CHARS {
            if let Some(fetcher) = &self.fetcher {
                if let Some(fetched) = fetcher.fetch_text(&item.permalink).await {
                    text.push('\n');
                    text.push_str(&fetched);
                }
            }
        }
        let links = self.link_text(&text);
        debug!(
            reddit_id = %item.reddit_id,
            links = links.len(),
            "Linked content item"
        );
        links
    }

    /// Side-effect-free variant of `link` over raw text, for analysis
    /// and testing. Every returned candidate meets its symbol's
    /// acceptance threshold; below-threshold candidates are discarded,
    /// never returned.
    pub fn link_text(&self, text: &str) -> Vec<TickerLink> {
        self.analyzer
            .score_all(text)
            .into_iter()
            .filter_map(|(reference, scored)| {
                let threshold = confidence_threshold(&reference.symbol);
                if scored.score >= threshold {
                    Some(TickerLink {
                        symbol: reference.symbol.clone(),
                        confidence: scored.score,
                        matched_terms: scored.matched_terms,
                        reasoning: scored.reasoning,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Link a batch through a small bounded worker pool. Items complete
    /// out of order; callers must not rely on ordering.
    pub async fn link_all(
        &self,
        items: Vec<ContentItem>,
        workers: usize,
    ) -> Vec<(ContentItem, Vec<TickerLink>)> {
        stream::iter(items.into_iter().map(|item| async move {
            let links = self.link(&item).await;
            (item, links)
        }))
        .buffer_unordered(workers.max(1))
        .collect()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickertalk_core::ContentKind;

    fn references() -> Vec<TickerReference> {
        vec![
            TickerReference {
                symbol: "V".to_string(),
                name: "Visa Inc".to_string(),
                aliases: vec!["Visa".to_string(), "Visa Inc".to_string()],
                positive_keywords: vec!["visa inc".to_string(), "payment network".to_string()],
                negative_keywords: vec![
                    "visa application".to_string(),
                    "travel".to_string(),
                    "immigration".to_string(),
                ],
                industry_keywords: vec![
                    "earnings".to_string(),
                    "stock".to_string(),
                    "shares".to_string(),
                ],
            },
            TickerReference {
                symbol: "NVDA".to_string(),
                name: "NVIDIA Corporation".to_string(),
                aliases: vec!["NVIDIA".to_string(), "Nvidia".to_string()],
                positive_keywords: vec!["gpu".to_string()],
                negative_keywords: vec![],
                industry_keywords: vec!["earnings".to_string(), "calls".to_string()],
            },
        ]
    }

    fn comment(body: &str) -> ContentItem {
        ContentItem {
            reddit_id: format!("t1_{}", body.len()),
            thread_id: "abc".to_string(),
            kind: ContentKind::Comment,
            title: None,
            body: body.to_string(),
            author: "tester".to_string(),
            score: 1,
            num_replies: 0,
            permalink: "/r/wallstreetbets/comments/abc/c/".to_string(),
            created_utc: 1_754_500_000,
        }
    }

    #[test]
    fn positive_context_produces_accepted_candidate() {
        let linker = TickerLinker::new(references());
        let links = linker.link_text("Visa Inc beats earnings expectations, V stock surges 5%");
        let visa = links.iter().find(|l| l.symbol == "V").expect("V candidate");
        assert!(visa.confidence >= 0.55);
        assert!(visa.matched_terms.contains(&"Visa Inc".to_string()));
    }

    #[test]
    fn negative_context_produces_no_candidate() {
        let linker = TickerLinker::new(references());
        let links = linker.link_text("Apply for a visa before traveling");
        assert!(links.iter().all(|l| l.symbol != "V"));
    }

    #[test]
    fn every_candidate_meets_its_threshold() {
        let linker = TickerLinker::new(references());
        let links = linker.link_text(
            "Visa Inc earnings beat, V shares up. NVDA earnings and gpu calls printing.",
        );
        assert!(!links.is_empty());
        for link in &links {
            let floor = if link.symbol.len() == 1 { 0.55 } else { 0.50 };
            assert!(
                link.confidence >= floor,
                "{} below threshold: {}",
                link.symbol,
                link.confidence
            );
        }
    }

    #[test]
    fn one_item_may_link_multiple_tickers() {
        let linker = TickerLinker::new(references());
        let links = linker.link_text(
            "Visa Inc earnings today, V stock moving. Also NVDA gpu earnings calls look juicy.",
        );
        let symbols: Vec<&str> = links.iter().map(|l| l.symbol.as_str()).collect();
        assert!(symbols.contains(&"V"));
        assert!(symbols.contains(&"NVDA"));
    }

    #[tokio::test]
    async fn link_without_fetcher_uses_stored_text_only() {
        let linker = TickerLinker::new(references());
        let links = linker
            .link(&comment("NVDA earnings gpu calls all in"))
            .await;
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].symbol, "NVDA");
    }

    #[tokio::test]
    async fn link_all_preserves_items_and_bounds_workers() {
        let linker = TickerLinker::new(references());
        let items: Vec<ContentItem> = (0..20)
            .map(|i| {
                let mut item = comment("NVDA earnings gpu calls are printing money today");
                item.reddit_id = format!("t1_c{}", i);
                item
            })
            .collect();
        let linked = linker.link_all(items, 5).await;
        assert_eq!(linked.len(), 20);
        assert!(linked.iter().all(|(_, links)| links.len() == 1));
    }
}
