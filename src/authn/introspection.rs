//! OAuth2 token introspection authenticator (RFC 7662)
//!
//! # Flow
//!
//! 1. Decode and resolve the rule configuration.
//! 2. Extract the bearer token; without one the authenticator is not
//!    responsible.
//! 3. POST `token=<token>` (plus `scope` when the scope strategy is
//!    disabled) to the introspection endpoint through a resilient transport.
//! 4. Check token type, `active`, audience, issuer and scopes, in that
//!    order, stopping at the first failure.
//! 5. Copy subject and claims into the session.
//!
//! Pre-authorized transports are built once per distinct pre-authorization
//! configuration and shared read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use dashmap::DashMap;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{AuthenticationSession, Authenticator, AuthnError, FailureKind, Outcome, Rule};
use crate::bearer::token_from_request;
use crate::config::{AuthenticatorSettings, IntrospectionConfig, PreAuthorization, ResolvedConfig};
use crate::transport::ResilientTransport;

/// Authenticator identifier
const ID: &str = "oauth2_introspection";

/// The only `token_type` accepted when the endpoint reports one
const ACCESS_TOKEN_TYPE: &str = "access_token";

/// Decoded introspection response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntrospectionResult {
    /// Whether the token is currently active
    pub active: bool,

    /// Extra claims (`ext`)
    #[serde(default, rename = "ext")]
    pub extra: Option<HashMap<String, Value>>,

    /// Subject (`sub`)
    #[serde(default, rename = "sub", deserialize_with = "null_as_default")]
    pub subject: String,

    /// Resource owner username
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,

    /// Audience (`aud`), a string or an array of strings
    #[serde(default, rename = "aud", deserialize_with = "string_or_seq")]
    pub audience: Vec<String>,

    /// Token type hint
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_type: String,

    /// Issuer (`iss`)
    #[serde(default, rename = "iss", deserialize_with = "null_as_default")]
    pub issuer: String,

    /// Client the token was issued to
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_id: String,

    /// Space-delimited granted scopes
    #[serde(default, deserialize_with = "null_as_default")]
    pub scope: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(aud)) => vec![aud],
        Some(OneOrMany::Many(aud)) => aud,
        None => Vec::new(),
    })
}

impl IntrospectionResult {
    /// Apply the configured policy, stopping at the first failing check
    pub fn check(&self, config: &ResolvedConfig) -> Result<(), AuthnError> {
        if !self.token_type.is_empty() && self.token_type != ACCESS_TOKEN_TYPE {
            return Err(AuthnError::forbidden(format!(
                "not an access token but \"{}\"",
                self.token_type
            )));
        }

        if !self.active {
            return Err(AuthnError::unauthorized("token not active"));
        }

        if let Some(audience) = config
            .target_audience
            .iter()
            .find(|aud| !self.audience.contains(aud))
        {
            return Err(AuthnError::forbidden(format!(
                "audience mismatch: token not intended for {audience}"
            )));
        }

        if !config.trusted_issuers.is_empty() && !config.trusted_issuers.contains(&self.issuer) {
            return Err(AuthnError::forbidden(format!(
                "issuer mismatch: \"{}\" is not trusted",
                self.issuer
            )));
        }

        if let Some(matches) = config.scope_strategy.matcher() {
            let granted: Vec<&str> = self.scope.split(' ').collect();
            if let Some(scope) = config
                .required_scope
                .iter()
                .find(|scope| !matches(&granted, scope))
            {
                return Err(AuthnError::forbidden(format!("scope not granted: {scope}")));
            }
        }

        Ok(())
    }

    /// Move subject and claims into the session
    pub fn into_session(self, session: &mut AuthenticationSession) {
        let mut extra = self.extra.unwrap_or_default();
        extra.insert("username".to_string(), Value::String(self.username));
        extra.insert("client_id".to_string(), Value::String(self.client_id));
        extra.insert("scope".to_string(), Value::String(self.scope));

        session.subject = self.subject;
        session.extra = extra;
    }
}

/// Authenticator validating bearer tokens against an introspection endpoint
pub struct OAuth2Introspection {
    settings: Arc<AuthenticatorSettings>,
    /// Used when pre-authorization is disabled
    default_transport: Arc<ResilientTransport>,
    /// Pre-authorized transports, one per distinct configuration
    pre_authorized: DashMap<PreAuthorization, Arc<ResilientTransport>>,
}

impl OAuth2Introspection {
    /// Create the authenticator with the default small-latency transport
    pub fn new(settings: Arc<AuthenticatorSettings>) -> crate::Result<Self> {
        Ok(Self::with_transport(
            settings,
            ResilientTransport::latency_tolerance_small()?,
        ))
    }

    /// Create the authenticator with a custom default transport
    #[must_use]
    pub fn with_transport(settings: Arc<AuthenticatorSettings>, transport: ResilientTransport) -> Self {
        Self {
            settings,
            default_transport: Arc::new(transport),
            pre_authorized: DashMap::new(),
        }
    }

    /// Decode and resolve a rule configuration, and pick its transport.
    ///
    /// Shared state is only touched to memoize a pre-authorized transport;
    /// an existing entry is never replaced.
    pub fn config(&self, raw: &[u8]) -> Result<(ResolvedConfig, Arc<ResilientTransport>), AuthnError> {
        let config: IntrospectionConfig = self
            .settings
            .decode(ID, raw)
            .map_err(|e| AuthnError::misconfigured(ID, e))?;
        let resolved = config.resolve().map_err(|e| AuthnError::misconfigured(ID, e))?;

        let transport = match &resolved.pre_authorization {
            Some(pre) => self.pre_authorized_transport(pre)?,
            None => self.default_transport.clone(),
        };

        Ok((resolved, transport))
    }

    /// Number of distinct pre-authorized transports built so far
    #[must_use]
    pub fn pre_authorized_transports(&self) -> usize {
        self.pre_authorized.len()
    }

    fn pre_authorized_transport(&self, pre: &PreAuthorization) -> Result<Arc<ResilientTransport>, AuthnError> {
        if let Some(transport) = self.pre_authorized.get(pre) {
            return Ok(transport.value().clone());
        }

        let transport = Arc::new(ResilientTransport::pre_authorized(pre).map_err(|e| AuthnError::misconfigured(ID, e))?);
        debug!(
            authenticator = ID,
            client_id = %pre.client_id,
            token_url = %pre.token_url,
            "Built pre-authorized introspection transport"
        );

        // A concurrent caller may have won the race; keep whichever is in the map.
        Ok(self
            .pre_authorized
            .entry(pre.clone())
            .or_insert(transport)
            .value()
            .clone())
    }

    async fn introspect(
        &self,
        config: &ResolvedConfig,
        transport: &ResilientTransport,
        token: &str,
    ) -> Result<IntrospectionResult, AuthnError> {
        let mut form = vec![("token", token.to_string())];
        if !config.scope_strategy.is_enabled() && !config.required_scope.is_empty() {
            form.push(("scope", config.required_scope.join(" ")));
        }

        let mut request = transport
            .request(Method::POST, config.introspection_url.clone())
            .headers(config.request_headers.clone())
            .form(&form)
            .build()
            .map_err(|e| AuthnError::transport(format!("failed to build introspection request: {e}")))?;
        request.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let response = transport.send(request).await.map_err(|e| {
            warn!(authenticator = ID, url = %config.introspection_url, error = %e, "Introspection request failed");
            AuthnError::transport(format!("introspection request failed: {e}"))
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(authenticator = ID, url = %config.introspection_url, status = status.as_u16(), "Introspection returned unexpected status");
            return Err(AuthnError::transport(format!(
                "unexpected status {}",
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthnError::transport(format!("failed to read introspection response: {e}")))?;

        serde_json::from_slice(&body)
            .map_err(|e| AuthnError::decode(format!("invalid introspection response: {e}")))
    }
}

#[async_trait]
impl Authenticator for OAuth2Introspection {
    fn id(&self) -> &'static str {
        ID
    }

    async fn authenticate(
        &self,
        request: &Parts,
        session: &mut AuthenticationSession,
        config: &[u8],
        rule: &Rule,
        cancel: &CancellationToken,
    ) -> Outcome {
        let (config, transport) = match self.config(config) {
            Ok(resolved) => resolved,
            Err(e) => return e.into(),
        };

        let Some(token) = token_from_request(request, config.token_from.as_ref()) else {
            return Outcome::NotResponsible;
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(authenticator = ID, rule = %rule.id, "Introspection aborted, request canceled");
                return AuthnError::new(FailureKind::Canceled, "request canceled during introspection").into();
            }
            result = self.introspect(&config, &transport, &token) => result,
        };

        let result = match result {
            Ok(result) => result,
            Err(e) => return e.into(),
        };

        if let Err(e) = result.check(&config) {
            debug!(authenticator = ID, rule = %rule.id, reason = %e, "Token rejected");
            return e.into();
        }

        result.into_session(session);
        debug!(authenticator = ID, rule = %rule.id, subject = %session.subject, "Token accepted");
        Outcome::Success
    }

    fn validate(&self, config: &[u8]) -> Result<(), AuthnError> {
        if !self.settings.is_enabled(ID) {
            return Err(AuthnError::not_enabled(ID));
        }
        self.config(config).map(|_| ())
    }
}
