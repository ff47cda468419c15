//! Pluggable request authenticators
//!
//! An [`Authenticator`] looks at an inbound request and either identifies
//! the caller ([`Outcome::Success`]), declines because the request carries
//! nothing it understands ([`Outcome::NotResponsible`]), or rejects it
//! ([`Outcome::Failure`]). [`AuthenticatorChain`] runs the authenticators a
//! matched rule names until one of them decides.

mod chain;
mod introspection;
mod outcome;
mod session;

pub use chain::AuthenticatorChain;
pub use introspection::{IntrospectionResult, OAuth2Introspection};
pub use outcome::{AuthnError, FailureKind, Outcome};
pub use session::{AuthenticationSession, Rule, RuleHandler};

use async_trait::async_trait;
use axum::http::request::Parts;
use tokio_util::sync::CancellationToken;

/// A request authenticator
///
/// One instance serves every concurrent request whose rule references it,
/// so implementations must not keep per-request state on `self`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Identifier rules use to reference this authenticator
    fn id(&self) -> &'static str;

    /// Authenticate a request, populating `session` on success.
    ///
    /// `config` is the rule-level raw JSON configuration. Cancelling
    /// `cancel` aborts any outbound call in flight.
    async fn authenticate(
        &self,
        request: &Parts,
        session: &mut AuthenticationSession,
        config: &[u8],
        rule: &Rule,
        cancel: &CancellationToken,
    ) -> Outcome;

    /// Check that the authenticator is enabled and `config` is valid
    fn validate(&self, config: &[u8]) -> Result<(), AuthnError>;
}
