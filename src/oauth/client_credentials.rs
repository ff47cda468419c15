//! Client-credentials token source
//!
//! Obtains an access token with the OAuth2 client-credentials grant
//! (RFC 6749 §4.4), caches it and fetches a new one shortly before expiry.

use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::token::TokenInfo;
use crate::config::PreAuthorization;
use crate::{Error, Result};

/// Longest token endpoint error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// OAuth token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

/// Shared, auto-refreshing client-credentials token
///
/// Readers holding a valid cached token never wait. When the token is
/// missing or stale, one caller fetches a new one while the others wait on
/// the refresh gate and then reuse its result.
pub struct ClientCredentialsSource {
    /// HTTP client for token requests
    http_client: Client,

    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    token_url: Url,

    /// Current token (cached)
    current_token: RwLock<Option<TokenInfo>>,

    /// Serializes refreshes
    refresh: Mutex<()>,
}

impl ClientCredentialsSource {
    /// Create a token source for the given pre-authorization settings
    #[must_use]
    pub fn new(http_client: Client, pre: &PreAuthorization) -> Self {
        Self {
            http_client,
            client_id: pre.client_id.clone(),
            client_secret: pre.client_secret.clone(),
            scopes: pre.scope.clone(),
            token_url: pre.token_url.clone(),
            current_token: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Get a valid access token, fetching a new one as needed
    pub async fn token(&self) -> Result<TokenInfo> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let _gate = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let token = self.fetch().await?;
        *self.current_token.write() = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub fn invalidate(&self) {
        *self.current_token.write() = None;
    }

    fn cached(&self) -> Option<TokenInfo> {
        self.current_token
            .read()
            .as_ref()
            .filter(|t| !t.is_expired())
            .cloned()
    }

    async fn fetch(&self) -> Result<TokenInfo> {
        let scope = self.scopes.join(" ");
        let mut params = vec![("grant_type", "client_credentials")];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }

        debug!(client_id = %self.client_id, token_url = %self.token_url, "Requesting client-credentials token");

        let response = self
            .http_client
            .post(self.token_url.clone())
            .basic_auth(form_encode(&self.client_id), Some(form_encode(&self.client_secret)))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(Error::TokenEndpoint { status, body });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse token response: {e}")))?;

        if token_response.access_token.is_empty() {
            return Err(Error::Internal("Token response carried an empty access_token".to_string()));
        }

        info!(client_id = %self.client_id, expires_in = ?token_response.expires_in, "Obtained client-credentials token");

        Ok(TokenInfo::from_response(
            token_response.access_token,
            token_response.token_type,
            token_response.expires_in,
        ))
    }
}

/// RFC 6749 §2.3.1: credentials are form-encoded before Basic encoding
fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
