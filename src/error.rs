//! Error types for transport, token source and configuration plumbing
//!
//! These are internal to the authenticator pipeline. Callers of an
//! [`Authenticator`](crate::authn::Authenticator) only ever see
//! [`AuthnError`](crate::authn::AuthnError) values.

use thiserror::Error;

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be decoded
    #[error("Configuration decode error: {}", describe_decode_error(.0))]
    ConfigDecode(#[from] figment::Error),

    /// Connection-level transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint refused to issue a client-credentials token
    #[error("Token endpoint returned status {status}: {body}")]
    TokenEndpoint {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the resilient transport may try the operation again.
    ///
    /// Only connection-level failures qualify. A well-formed HTTP response,
    /// whatever its status, is never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

/// Kind and key of each decode error, without figment's source metadata
fn describe_decode_error(error: &figment::Error) -> String {
    error
        .clone()
        .into_iter()
        .map(|e| {
            if e.path.is_empty() {
                e.kind.to_string()
            } else {
                format!("{} for key \"{}\"", e.kind, e.path.join("."))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
