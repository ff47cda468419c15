//! Authenticator dispatch for a matched rule

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::request::Parts;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AuthenticationSession, Authenticator, AuthnError, FailureKind, Outcome, Rule};

/// Registered authenticators, keyed by identifier
#[derive(Default, Clone)]
pub struct AuthenticatorChain {
    authenticators: HashMap<&'static str, Arc<dyn Authenticator>>,
}

impl AuthenticatorChain {
    /// Empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticator under its identifier
    pub fn register(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticators.insert(authenticator.id(), authenticator);
    }

    /// Validate every authenticator a rule references, at rule load time
    pub fn validate_rule(&self, rule: &Rule) -> Result<(), AuthnError> {
        if rule.authenticators.is_empty() {
            return Err(AuthnError::new(
                FailureKind::Misconfigured,
                format!("rule {} has no authenticators", rule.id),
            ));
        }
        for handler in &rule.authenticators {
            let authenticator = self.lookup(&handler.handler)?;
            authenticator.validate(&handler.raw_config())?;
        }
        Ok(())
    }

    /// Run the rule's authenticators in order.
    ///
    /// `NotResponsible` moves on to the next authenticator; the first success
    /// or failure decides. If no authenticator is responsible the request is
    /// unauthorized.
    pub async fn authenticate(
        &self,
        request: &Parts,
        rule: &Rule,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationSession, AuthnError> {
        let mut session = AuthenticationSession::default();

        for handler in &rule.authenticators {
            let authenticator = self.lookup(&handler.handler)?;
            let config = handler.raw_config();

            match authenticator
                .authenticate(request, &mut session, &config, rule, cancel)
                .await
            {
                Outcome::Success => {
                    debug!(rule = %rule.id, authenticator = %handler.handler, "Request authenticated");
                    return Ok(session);
                }
                Outcome::NotResponsible => {
                    debug!(rule = %rule.id, authenticator = %handler.handler, "Authenticator not responsible");
                }
                Outcome::Failure(e) => {
                    debug!(rule = %rule.id, authenticator = %handler.handler, error = %e, "Authentication failed");
                    return Err(e);
                }
            }
        }

        Err(AuthnError::unauthorized(format!(
            "no authenticator responsible for rule {}",
            rule.id
        )))
    }

    fn lookup(&self, id: &str) -> Result<&Arc<dyn Authenticator>, AuthnError> {
        self.authenticators
            .get(id)
            .ok_or_else(|| AuthnError::new(FailureKind::Misconfigured, format!("unknown authenticator {id}")))
    }
}
