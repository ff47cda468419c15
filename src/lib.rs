//! OAuth2 Introspection Authenticator
//!
//! Request-level authentication stage for an identity and access proxy.
//! A chain of pluggable authenticators decides whether the caller is
//! identified and under what subject and claims.
//!
//! # Features
//!
//! - **Authenticator contract**: explicit `Success` / `NotResponsible` /
//!   `Failure` outcomes, with 401 vs 403 distinguishable for the caller
//! - **Token introspection**: RFC 7662 validation with audience, issuer and
//!   scope policy (exact, hierarchic, wildcard or server-side)
//! - **Pre-authorization**: client-credentials token for calling the
//!   introspection endpoint, cached and refreshed automatically
//! - **Resilient transport**: bounded retry with backoff on connection
//!   failures, prompt abort on request cancellation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authn;
pub mod bearer;
pub mod config;
pub mod error;
pub mod failsafe;
pub mod oauth;
pub mod scope;
pub mod transport;

pub use authn::{
    AuthenticationSession, Authenticator, AuthenticatorChain, AuthnError, FailureKind, OAuth2Introspection,
    Outcome, Rule,
};
pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let initialized = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    initialized.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_installs_once() {
        assert!(setup_tracing("debug", Some("json")).is_ok());
        assert!(matches!(setup_tracing("info", None), Err(Error::Internal(_))));
    }
}
