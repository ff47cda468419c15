//! Per-request authentication state and matched rules

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity resolved for one inbound request.
///
/// Created empty by the chain and filled in by the authenticator that
/// succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationSession {
    /// Subject identifier
    pub subject: String,
    /// Additional claims
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

/// An authenticator reference on a rule, with its rule-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleHandler {
    /// Authenticator identifier, e.g. `oauth2_introspection`
    pub handler: String,
    /// Rule-level configuration layered over the authenticator's defaults
    #[serde(default)]
    pub config: Value,
}

impl RuleHandler {
    /// Raw configuration bytes as handed to an authenticator
    #[must_use]
    pub fn raw_config(&self) -> Vec<u8> {
        if self.config.is_null() {
            Vec::new()
        } else {
            self.config.to_string().into_bytes()
        }
    }
}

/// The access rule matched for a request (authentication view only)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identifier
    pub id: String,
    /// Authenticators to try, in order
    #[serde(default)]
    pub authenticators: Vec<RuleHandler>,
}
