//! Authenticator outcomes and failure taxonomy

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use crate::Error;

/// Result of one authenticator looking at one request
#[derive(Debug)]
#[must_use]
pub enum Outcome {
    /// The session was populated
    Success,
    /// This authenticator does not apply; the chain tries the next one
    NotResponsible,
    /// The request is rejected by this authenticator
    Failure(AuthnError),
}

impl Outcome {
    /// Whether the authenticator succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The failure, if any
    pub fn failure(&self) -> Option<&AuthnError> {
        match self {
            Self::Failure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AuthnError> for Outcome {
    fn from(error: AuthnError) -> Self {
        Self::Failure(error)
    }
}

/// Why an authenticator rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Authenticator administratively disabled
    NotEnabled,
    /// Configuration failed to decode or validate
    Misconfigured,
    /// Token present but not active
    Unauthorized,
    /// Token active but fails type, audience, issuer or scope policy
    Forbidden,
    /// Network failure or unexpected status from the introspection endpoint
    Transport,
    /// Malformed introspection response
    Decode,
    /// The inbound request was canceled while authenticating
    Canceled,
}

impl FailureKind {
    /// HTTP status to answer the rejected request with
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotEnabled | Self::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transport | Self::Decode => StatusCode::BAD_GATEWAY,
            Self::Canceled => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotEnabled => "not enabled",
            Self::Misconfigured => "misconfigured",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Transport => "upstream authentication failure",
            Self::Decode => "malformed introspection response",
            Self::Canceled => "canceled",
        })
    }
}

/// A failed authentication with enough detail to find the failing check
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct AuthnError {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable reason
    pub detail: String,
}

impl AuthnError {
    /// Create an error of the given kind
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Authenticator disabled
    pub fn not_enabled(id: &str) -> Self {
        Self::new(FailureKind::NotEnabled, format!("authenticator {id} is disabled"))
    }

    /// Configuration problem
    pub fn misconfigured(id: &str, error: impl fmt::Display) -> Self {
        Self::new(
            FailureKind::Misconfigured,
            format!("authenticator {id} is misconfigured: {error}"),
        )
    }

    /// Token not active
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Unauthorized, detail)
    }

    /// Token fails policy
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Forbidden, detail)
    }

    /// Introspection endpoint unreachable or misbehaving
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, detail)
    }

    /// Response body could not be decoded
    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Decode, detail)
    }

    /// HTTP status to answer the rejected request with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }
}

impl From<Error> for AuthnError {
    fn from(error: Error) -> Self {
        let kind = match &error {
            Error::Config(_) | Error::ConfigDecode(_) => FailureKind::Misconfigured,
            _ => FailureKind::Transport,
        };
        Self::new(kind, error.to_string())
    }
}
