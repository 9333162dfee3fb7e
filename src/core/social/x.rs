use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::core::social::{AccountIdentity, SocialClient, TokenPair};

const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";
const ME_URL: &str = "https://api.twitter.com/2/users/me";

/// Scopes the posting loop needs; offline.access keeps refresh
/// tokens coming.
pub const OAUTH_SCOPES: [&str; 4] = [
    "tweet.read",
    "tweet.write",
    "users.read",
    "offline.access",
];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    text: String,
}

#[derive(Deserialize)]
struct CreatedPost {
    data: CreatedPostData,
}

#[derive(Deserialize)]
struct CreatedPostData {
    id: String,
}

#[derive(Deserialize)]
struct MeResponse {
    data: MeData,
}

#[derive(Deserialize)]
struct MeData {
    id: String,
    username: String,
}

pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn generate_code_verifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// S256 code challenge per RFC 7636: base64url(sha256(verifier)), no padding.
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

pub fn build_authorize_url(
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> String {
    let scopes = OAUTH_SCOPES.join(" ");
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
        AUTHORIZE_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes),
        state,
        challenge
    )
}

/// X API v2 client over reqwest. One instance is shared by all agents;
/// per-agent credentials ride in on every call.
pub struct XApiClient {
    client: Client,
}

impl XApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn token_request(
        &self,
        client_id: &str,
        client_secret: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenPair> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("token request failed (HTTP {}): {}", status, body));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("failed to parse token response: {}", e))?;
        if let Some(error) = token.error {
            let desc = token.error_description.unwrap_or_default();
            return Err(anyhow!("OAuth error: {} - {}", error, desc));
        }

        match (token.access_token, token.refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(TokenPair {
                access_token,
                refresh_token,
            }),
            _ => Err(anyhow!("token response missing access or refresh token")),
        }
    }

    /// Authorization-code + PKCE exchange for the one-time handshake.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenPair> {
        self.token_request(
            client_id,
            client_secret,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", code_verifier),
                ("redirect_uri", redirect_uri),
            ],
        )
        .await
    }
}

impl Default for XApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocialClient for XApiClient {
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenPair> {
        self.token_request(
            client_id,
            client_secret,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn search_recent(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>> {
        let max_results = max_results.to_string();
        let res = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(access_token)
            .query(&[
                ("query", query),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "text,created_at"),
            ])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "search failed (HTTP {}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: SearchResponse = res.json().await?;
        Ok(parsed.data.into_iter().map(|item| item.text).collect())
    }

    async fn publish(&self, access_token: &str, text: &str) -> Result<String> {
        let res = self
            .client
            .post(TWEETS_URL)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "publish failed (HTTP {}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: CreatedPost = res.json().await?;
        Ok(parsed.data.id)
    }

    async fn me(&self, access_token: &str) -> Result<AccountIdentity> {
        let res = self.client.get(ME_URL).bearer_auth(access_token).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "identity lookup failed (HTTP {}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: MeResponse = res.json().await?;
        Ok(AccountIdentity {
            handle: parsed.data.username,
            id: parsed.data.id,
        })
    }
}
