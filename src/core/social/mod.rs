pub mod x;

use anyhow::Result;
use async_trait::async_trait;

/// The rotating OAuth2 credential pair for one agent's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct AccountIdentity {
    pub handle: String,
    pub id: String,
}

/// Everything the publish pipeline needs from the social provider.
/// Implemented over the X API v2; mocked in tests.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Exchange a refresh token for a new token pair. Refresh tokens
    /// are single-use, so callers must persist the result even when
    /// the rest of their work fails.
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenPair>;

    /// Recent public posts matching a query, provider order, capped.
    async fn search_recent(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>>;

    /// Publish a post; returns the created post id.
    async fn publish(&self, access_token: &str, text: &str) -> Result<String>;

    /// The account behind an access token. Used by the authorization
    /// callback to record which account an agent posts as.
    async fn me(&self, access_token: &str) -> Result<AccountIdentity>;
}
