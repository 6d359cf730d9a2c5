use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Credentials and connection settings, read from the environment once at
/// startup. A missing credential is fatal before any scraping begins.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,
    pub database_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            reddit_client_id: require_env("REDDIT_CLIENT_ID")?,
            reddit_client_secret: require_env("REDDIT_CLIENT_SECRET")?,
            reddit_user_agent: std::env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| default_user_agent()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://tickertalk.db?mode=rwc".to_string()),
        })
    }
}

fn require_env(var_name: &str) -> Result<String, ConfigError> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        })
}

fn default_user_agent() -> String {
    format!("tickertalk/{} (ingestion bot)", env!("CARGO_PKG_VERSION"))
}

/// Per-forum scrape rules plus pipeline tuning, passed into the
/// orchestrator at construction and never read ad hoc mid-run.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    /// Items (plus their links) committed per transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Bounded worker pool for entity linking within a batch.
    #[serde(default = "default_link_workers")]
    pub link_workers: usize,
    /// Reply-tree expansion depth passed to the provider; `None` lets the
    /// provider decide. Unlimited expansion is possible but expensive.
    #[serde(default)]
    pub max_expand: Option<u32>,
    #[serde(default = "default_forums")]
    pub forums: Vec<ForumRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForumRule {
    pub subreddit: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Case-insensitive title keywords marking recurring discussion threads.
    #[serde(default = "default_discussion_keywords")]
    pub discussion_keywords: Vec<String>,
    /// Comment budget for daily/weekend discussion threads.
    #[serde(default = "default_discussion_comment_limit")]
    pub discussion_comment_limit: u32,
    /// Comment budget for ordinary top posts.
    #[serde(default = "default_top_post_comment_limit")]
    pub top_post_comment_limit: u32,
    #[serde(default = "default_max_posts_per_run")]
    pub max_posts_per_run: u32,
}

impl ForumRule {
    pub fn comment_limit(&self, discussion: bool) -> u32 {
        if discussion {
            self.discussion_comment_limit
        } else {
            self.top_post_comment_limit
        }
    }
}

fn default_batch_size() -> usize {
    200
}

fn default_link_workers() -> usize {
    5
}

fn default_enabled() -> bool {
    true
}

fn default_discussion_keywords() -> Vec<String> {
    [
        "daily discussion",
        "weekend discussion",
        "what are your moves",
        "moves tomorrow",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_discussion_comment_limit() -> u32 {
    500
}

fn default_top_post_comment_limit() -> u32 {
    100
}

fn default_max_posts_per_run() -> u32 {
    25
}

fn default_forums() -> Vec<ForumRule> {
    vec![ForumRule {
        subreddit: "wallstreetbets".to_string(),
        enabled: true,
        discussion_keywords: default_discussion_keywords(),
        discussion_comment_limit: default_discussion_comment_limit(),
        top_post_comment_limit: default_top_post_comment_limit(),
        max_posts_per_run: default_max_posts_per_run(),
    }]
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            link_workers: default_link_workers(),
            max_expand: None,
            forums: default_forums(),
        }
    }
}

impl ScrapeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config: ScrapeConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.link_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "link_workers".to_string(),
                value: "0".to_string(),
            });
        }
        if !self.forums.iter().any(|f| f.enabled) {
            return Err(ConfigError::ValidationFailed {
                reason: "no enabled forums configured".to_string(),
            });
        }
        Ok(())
    }

    pub fn enabled_forums(&self) -> impl Iterator<Item = &ForumRule> {
        self.forums.iter().filter(|f| f.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ScrapeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.link_workers, 5);
        assert_eq!(config.enabled_forums().count(), 1);
    }

    #[test]
    fn parses_forum_overrides_from_toml() {
        let raw = r#"
            batch_size = 50

            [[forums]]
            subreddit = "stocks"
            discussion_keywords = ["rate my portfolio"]
            max_posts_per_run = 10

            [[forums]]
            subreddit = "options"
            enabled = false
        "#;
        let config: ScrapeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.forums.len(), 2);
        assert_eq!(config.forums[0].subreddit, "stocks");
        assert_eq!(
            config.forums[0].discussion_keywords,
            vec!["rate my portfolio".to_string()]
        );
        // Unspecified limits keep their defaults
        assert_eq!(config.forums[0].discussion_comment_limit, 500);
        assert_eq!(config.enabled_forums().count(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_config_without_enabled_forums() {
        let raw = r#"
            [[forums]]
            subreddit = "stocks"
            enabled = false
        "#;
        let config: ScrapeConfig = toml::from_str(raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = ScrapeConfig {
            batch_size: 0,
            ..ScrapeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "batch_size"
        ));
    }

    #[test]
    fn comment_limit_selects_by_thread_kind() {
        let rule = &default_forums()[0];
        assert_eq!(rule.comment_limit(true), 500);
        assert_eq!(rule.comment_limit(false), 100);
    }

    #[test]
    fn missing_credential_env_is_fatal() {
        std::env::remove_var("TICKERTALK_TEST_MISSING_VAR");
        let err = require_env("TICKERTALK_TEST_MISSING_VAR").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingEnvironmentVariable { ref var_name }
                if var_name == "TICKERTALK_TEST_MISSING_VAR"
        ));
    }
}
