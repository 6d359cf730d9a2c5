use regex::Regex;
use std::collections::BTreeSet;
use tickertalk_core::TickerReference;

// Scoring weights. Centralized so they can be tuned and tested without
// touching the matching control flow.
pub(crate) const BASE_SCORE: f64 = 0.30;
pub(crate) const POSITIVE_KEYWORD_BONUS: f64 = 0.15;
pub(crate) const INDUSTRY_KEYWORD_BONUS: f64 = 0.10;
pub(crate) const NEGATIVE_KEYWORD_PENALTY: f64 = 0.35;
pub(crate) const CASHTAG_BONUS: f64 = 0.25;

/// This many distinct negative keywords near a mention vetoes the match
/// outright, regardless of positive signal.
pub(crate) const NEGATIVE_VETO_COUNT: usize = 2;

/// Bytes of surrounding text examined on each side of a mention.
pub(crate) const CONTEXT_WINDOW_BYTES: usize = 120;

/// Acceptance threshold for ordinary multi-character symbols.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.50;
/// Raised threshold for single-letter and common-word symbols, which
/// collide with ordinary prose far more often.
pub const AMBIGUOUS_CONFIDENCE_THRESHOLD: f64 = 0.55;

/// Multi-letter symbols that double as common English words.
const AMBIGUOUS_SYMBOLS: &[&str] = &[
    "ALL", "ANY", "ARE", "BIG", "CAN", "DD", "EAT", "FOR", "GO", "IT", "NEW", "NOW", "ON", "ONE",
    "OUT", "SEE", "SO",
];

pub fn confidence_threshold(symbol: &str) -> f64 {
    if symbol.chars().count() == 1 || AMBIGUOUS_SYMBOLS.contains(&symbol) {
        AMBIGUOUS_CONFIDENCE_THRESHOLD
    } else {
        DEFAULT_CONFIDENCE_THRESHOLD
    }
}

/// Result of scoring one ticker against one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextScore {
    pub score: f64,
    pub matched_terms: Vec<String>,
    pub reasoning: String,
}

struct AliasPattern {
    term: String,
    regex: Regex,
}

struct TickerMatcher {
    reference: TickerReference,
    aliases: Vec<AliasPattern>,
    cashtag: Regex,
}

/// Bare ticker symbols are matched case-sensitively so that `V` does not
/// fire inside ordinary words; company names and multi-word aliases are
/// matched case-insensitively.
fn is_bare_symbol(alias: &str) -> bool {
    alias.len() <= 5
        && !alias.is_empty()
        && alias.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

impl TickerMatcher {
    fn new(reference: TickerReference) -> Self {
        let mut aliases = Vec::with_capacity(reference.aliases.len() + 1);
        let mut seen = BTreeSet::new();
        for alias in reference.aliases.iter().chain([&reference.symbol]) {
            let alias = alias.trim();
            if alias.is_empty() || !seen.insert(alias.to_string()) {
                continue;
            }
            let pattern = if is_bare_symbol(alias) {
                format!(r"\b{}\b", regex::escape(alias))
            } else {
                format!(r"(?i)\b{}\b", regex::escape(alias))
            };
            aliases.push(AliasPattern {
                term: alias.to_string(),
                regex: Regex::new(&pattern).expect("alias pattern"),
            });
        }
        let cashtag = Regex::new(&format!(r"(?i)\${}\b", regex::escape(&reference.symbol)))
            .expect("cashtag pattern");
        Self {
            reference,
            aliases,
            cashtag,
        }
    }
}

/// Scores whether a textual mention of a ticker alias is actually about
/// the company, from the keyword context around each occurrence.
pub struct ContextAnalyzer {
    matchers: Vec<TickerMatcher>,
}

impl ContextAnalyzer {
    pub fn new(references: Vec<TickerReference>) -> Self {
        Self {
            matchers: references.into_iter().map(TickerMatcher::new).collect(),
        }
    }

    pub fn references(&self) -> impl Iterator<Item = &TickerReference> {
        self.matchers.iter().map(|m| &m.reference)
    }

    /// Score every known ticker against `text`, returning only tickers
    /// with at least one alias occurrence.
    pub fn score_all<'a>(
        &'a self,
        text: &str,
    ) -> Vec<(&'a TickerReference, ContextScore)> {
        self.matchers
            .iter()
            .filter_map(|matcher| {
                let score = score_matcher(matcher, text);
                if score.matched_terms.is_empty() {
                    None
                } else {
                    Some((&matcher.reference, score))
                }
            })
            .collect()
    }

    /// Score one symbol; `None` if the symbol is not in the reference set.
    pub fn score(&self, text: &str, symbol: &str) -> Option<ContextScore> {
        self.matchers
            .iter()
            .find(|m| m.reference.symbol == symbol)
            .map(|m| score_matcher(m, text))
    }
}

fn score_matcher(matcher: &TickerMatcher, text: &str) -> ContextScore {
    let mut matched_terms: Vec<String> = Vec::new();
    let mut windows: Vec<&str> = Vec::new();

    for alias in &matcher.aliases {
        let mut hit = false;
        for found in alias.regex.find_iter(text) {
            hit = true;
            windows.push(context_window(text, found.start(), found.end()));
        }
        if hit {
            matched_terms.push(alias.term.clone());
        }
    }

    let mut cashtag_hit = false;
    for found in matcher.cashtag.find_iter(text) {
        cashtag_hit = true;
        windows.push(context_window(text, found.start(), found.end()));
    }
    if cashtag_hit {
        matched_terms.push(format!("${}", matcher.reference.symbol));
    }

    if matched_terms.is_empty() {
        return ContextScore {
            score: 0.0,
            matched_terms,
            reasoning: format!("no alias occurrences for {}", matcher.reference.symbol),
        };
    }

    let positive = keywords_near(&windows, &matcher.reference.positive_keywords);
    let industry = keywords_near(&windows, &matcher.reference.industry_keywords);
    let negative = keywords_near(&windows, &matcher.reference.negative_keywords);

    if negative.len() >= NEGATIVE_VETO_COUNT {
        return ContextScore {
            score: 0.0,
            matched_terms,
            reasoning: format!(
                "vetoed: {} negative context terms {:?} near mention of {}",
                negative.len(),
                negative,
                matcher.reference.symbol
            ),
        };
    }

    let mut score = BASE_SCORE
        + POSITIVE_KEYWORD_BONUS * positive.len() as f64
        + INDUSTRY_KEYWORD_BONUS * industry.len() as f64
        - NEGATIVE_KEYWORD_PENALTY * negative.len() as f64;
    if cashtag_hit {
        score += CASHTAG_BONUS;
    }
    let score = score.clamp(0.0, 1.0);

    let reasoning = format!(
        "aliases {:?}; positive {:?}; industry {:?}; negative {:?}{}",
        matched_terms,
        positive,
        industry,
        negative,
        if cashtag_hit { "; cashtag" } else { "" }
    );

    ContextScore {
        score,
        matched_terms,
        reasoning,
    }
}

/// Distinct keywords found (case-insensitive) inside any occurrence window.
fn keywords_near(windows: &[&str], keywords: &[String]) -> Vec<String> {
    let lowered: Vec<String> = windows.iter().map(|w| w.to_lowercase()).collect();
    let mut found = BTreeSet::new();
    for keyword in keywords {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if lowered.iter().any(|w| w.contains(&needle)) {
            found.insert(keyword.clone());
        }
    }
    found.into_iter().collect()
}

/// Slice of `text` around an occurrence, clamped to char boundaries.
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let mut from = start.saturating_sub(CONTEXT_WINDOW_BYTES);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + CONTEXT_WINDOW_BYTES).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    &text[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visa_reference() -> TickerReference {
        TickerReference {
            symbol: "V".to_string(),
            name: "Visa Inc".to_string(),
            aliases: vec!["Visa".to_string(), "Visa Inc".to_string()],
            positive_keywords: vec![
                "visa inc".to_string(),
                "payment network".to_string(),
                "mastercard".to_string(),
            ],
            negative_keywords: vec![
                "visa application".to_string(),
                "travel".to_string(),
                "immigration".to_string(),
                "embassy".to_string(),
            ],
            industry_keywords: vec![
                "earnings".to_string(),
                "stock".to_string(),
                "shares".to_string(),
                "revenue".to_string(),
            ],
        }
    }

    fn nvda_reference() -> TickerReference {
        TickerReference {
            symbol: "NVDA".to_string(),
            name: "NVIDIA Corporation".to_string(),
            aliases: vec!["NVIDIA".to_string(), "Nvidia".to_string()],
            positive_keywords: vec!["gpu".to_string(), "datacenter".to_string()],
            negative_keywords: vec![],
            industry_keywords: vec!["earnings".to_string(), "calls".to_string()],
        }
    }

    fn analyzer() -> ContextAnalyzer {
        ContextAnalyzer::new(vec![visa_reference(), nvda_reference()])
    }

    #[test]
    fn bare_symbol_matching_is_case_sensitive() {
        let analyzer = analyzer();
        let score = analyzer.score("I bought nvda yesterday", "NVDA").unwrap();
        assert!(score.matched_terms.is_empty());
        assert_eq!(score.score, 0.0);

        let score = analyzer.score("I bought NVDA yesterday", "NVDA").unwrap();
        assert_eq!(score.matched_terms, vec!["NVDA".to_string()]);
    }

    #[test]
    fn company_name_matching_is_case_insensitive() {
        let analyzer = analyzer();
        let score = analyzer.score("nvidia just announced earnings", "NVDA").unwrap();
        assert!(score.matched_terms.iter().any(|t| t == "Nvidia" || t == "NVIDIA"));
        assert!(score.score > BASE_SCORE);
    }

    #[test]
    fn symbol_does_not_fire_inside_words() {
        let analyzer = analyzer();
        // "V" must not match the V in "Very" or inside "Visa"-cased words
        let score = analyzer.score("Very volatile session today", "V").unwrap();
        assert!(score.matched_terms.is_empty());
    }

    #[test]
    fn positive_financial_context_raises_score() {
        let analyzer = analyzer();
        let score = analyzer
            .score(
                "Visa Inc beats earnings expectations, V stock surges 5%",
                "V",
            )
            .unwrap();
        assert!(
            score.score >= AMBIGUOUS_CONFIDENCE_THRESHOLD,
            "score {} too low: {}",
            score.score,
            score.reasoning
        );
        assert!(score.matched_terms.contains(&"V".to_string()));
        assert!(score.matched_terms.contains(&"Visa Inc".to_string()));
    }

    #[test]
    fn negative_context_suppresses_score() {
        let analyzer = analyzer();
        let score = analyzer
            .score("Apply for a visa before traveling", "V")
            .unwrap();
        assert!(
            score.score < AMBIGUOUS_CONFIDENCE_THRESHOLD,
            "score {} should be below threshold: {}",
            score.score,
            score.reasoning
        );
    }

    #[test]
    fn two_negative_terms_veto_despite_positive_signal() {
        let analyzer = analyzer();
        let score = analyzer
            .score(
                "Visa Inc earnings aside, my travel visa application at the embassy was denied",
                "V",
            )
            .unwrap();
        assert_eq!(score.score, 0.0);
        assert!(score.reasoning.contains("vetoed"));
    }

    #[test]
    fn cashtag_counts_even_for_single_letter_symbols() {
        let analyzer = analyzer();
        let score = analyzer.score("loading up on $v leaps", "V").unwrap();
        assert!(score.matched_terms.contains(&"$V".to_string()));
        assert!(score.score >= BASE_SCORE + CASHTAG_BONUS - 1e-9);
    }

    #[test]
    fn keywords_outside_window_do_not_count() {
        let analyzer = analyzer();
        let padding = "x".repeat(CONTEXT_WINDOW_BYTES + 40);
        let text = format!("NVDA is moving. {} earnings tomorrow", padding);
        let score = analyzer.score(&text, "NVDA").unwrap();
        assert_eq!(score.score, BASE_SCORE);
    }

    #[test]
    fn score_is_clamped_to_unit_interval() {
        let analyzer = analyzer();
        let score = analyzer
            .score(
                "$NVDA NVDA Nvidia NVIDIA gpu datacenter earnings calls",
                "NVDA",
            )
            .unwrap();
        assert!(score.score <= 1.0);
    }

    #[test]
    fn thresholds_depend_on_symbol_shape() {
        assert_eq!(confidence_threshold("V"), AMBIGUOUS_CONFIDENCE_THRESHOLD);
        assert_eq!(confidence_threshold("NOW"), AMBIGUOUS_CONFIDENCE_THRESHOLD);
        assert_eq!(confidence_threshold("NVDA"), DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn unknown_symbol_scores_none() {
        assert!(analyzer().score("anything", "ZZZZ").is_none());
    }
}
