use sqlx::error::DatabaseError as _;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Linker error: {0}")]
    Linker(#[from] LinkerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Rate limit quota exhausted after {attempts} attempts")]
    QuotaExhausted { attempts: u32 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Subreddit not found: {subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("Thread not found: {thread_id}")]
    ThreadNotFound { thread_id: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {details}")]
    MigrationFailed { details: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug, Clone)]
pub enum LinkerError {
    #[error("Content fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Unsupported content type: {content_type}")]
    UnsupportedContent { content_type: String },

    #[error("Fetched content exceeded {limit_bytes} bytes")]
    OversizedContent { limit_bytes: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RedditApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedditApiError::RateLimitExceeded { .. }
                | RedditApiError::ServerError { .. }
                | RedditApiError::RequestTimeout
                | RedditApiError::InvalidResponse { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }
}

impl CoreError {
    /// Whether the orchestrator may usefully retry the failed operation
    /// within the same run.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            CoreError::Database(DatabaseError::Sql(sqlx::Error::PoolTimedOut)) => true,
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            _ => None,
        }
    }

    /// Uniqueness races on the external-id key are expected under
    /// concurrent runs and must be skipped per item, not escalated.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            CoreError::Database(DatabaseError::ConstraintViolation { .. }) => true,
            CoreError::Database(DatabaseError::Sql(sqlx::Error::Database(db))) => {
                db.message().contains("UNIQUE constraint failed")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_error_is_retryable_with_delay() {
        let err = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 90 });
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn auth_error_is_terminal() {
        let err = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
            reason: "bad credentials".to_string(),
        });
        assert!(!err.is_retryable());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn quota_exhaustion_is_not_retryable() {
        // After the backoff ladder is spent the thread is abandoned for
        // this run, so the error must not look retryable to callers.
        let err = CoreError::RedditApi(RedditApiError::QuotaExhausted { attempts: 3 });
        assert!(!err.is_retryable());
    }

    #[test]
    fn constraint_violation_is_unique_violation() {
        let err = CoreError::Database(DatabaseError::ConstraintViolation {
            constraint: "articles.reddit_id".to_string(),
        });
        assert!(err.is_unique_violation());
        assert!(!err.is_retryable());
    }
}
