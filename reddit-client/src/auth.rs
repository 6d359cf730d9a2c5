use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, TokenResponse, TokenUrl};
use std::time::Duration;
use tickertalk_core::{CoreError, RedditApiError};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Headless app-only token manager. The client-credentials grant has no
/// refresh token; a stale token is replaced by re-exchanging credentials.
#[derive(Debug)]
pub struct AuthManager {
    oauth: BasicClient,
    token: RwLock<Option<CachedToken>>,
}

impl AuthManager {
    pub fn new(config: &RedditAuthConfig) -> Self {
        let oauth = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(AUTH_URL.to_string()).expect("valid authorize URL"),
            Some(TokenUrl::new(TOKEN_URL.to_string()).expect("valid token URL")),
        )
        .set_auth_type(AuthType::BasicAuth);

        Self {
            oauth,
            token: RwLock::new(None),
        }
    }

    /// Current access token, re-authenticating if the cached one is
    /// absent or within the expiry margin.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at.saturating_duration_since(Instant::now()) > EXPIRY_MARGIN {
                return Ok(token.access_token.clone());
            }
            debug!("Cached access token near expiry, re-authenticating");
        }
        self.authenticate().await
    }

    pub async fn is_authenticated(&self) -> bool {
        match self.token.read().await.as_ref() {
            Some(token) => {
                token.expires_at.saturating_duration_since(Instant::now()) > EXPIRY_MARGIN
            }
            None => false,
        }
    }

    async fn authenticate(&self) -> Result<String, CoreError> {
        let response = self
            .oauth
            .exchange_client_credentials()
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let expires_in = response.expires_in().unwrap_or(Duration::from_secs(3600));
        let access_token = response.access_token().secret().clone();
        info!("Obtained app-only access token, valid for {:?}", expires_in);

        *self.token.write().await = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + expires_in,
        });
        Ok(access_token)
    }
}
