//! Cached access tokens

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Tokens are treated as expired this long before their real expiry
const EXPIRY_DELTA: Duration = Duration::from_secs(10);

/// Access token obtained from a token endpoint
#[derive(Clone)]
pub struct TokenInfo {
    /// Access token
    pub access_token: String,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Expiry instant, `None` if the endpoint did not say
    pub expires_at: Option<Instant>,
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenInfo {
    /// Create token info from an OAuth token response
    #[must_use]
    pub fn from_response(access_token: String, token_type: Option<String>, expires_in: Option<u64>) -> Self {
        Self {
            access_token,
            token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: expires_in.map(|secs| Instant::now() + Duration::from_secs(secs)),
        }
    }

    /// Check if the token is expired (with a small safety margin)
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() + EXPIRY_DELTA >= expires_at)
    }

    /// Value for the `Authorization` header
    #[must_use]
    pub fn authorization(&self) -> String {
        // Some servers answer "bearer"; RFC 6750 clients send "Bearer".
        let scheme = if self.token_type.eq_ignore_ascii_case("bearer") || self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{scheme} {}", self.access_token)
    }
}
