//! Authenticator configuration
//!
//! Configuration arrives as raw JSON bytes attached to a matched rule. It is
//! layered over the authenticator's global defaults held by
//! [`AuthenticatorSettings`], decoded into [`IntrospectionConfig`] and then
//! resolved into an immutable [`ResolvedConfig`].

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use figment::{Figment, providers::Serialized};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::bearer::BearerTokenLocation;
use crate::failsafe::RetryPolicy;
use crate::scope::ScopeStrategy;
use crate::{Error, Result};

/// `oauth2_introspection` authenticator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntrospectionConfig {
    /// Scopes the token must carry
    #[serde(default)]
    pub required_scope: Vec<String>,

    /// Audiences that must all appear in the token's `aud`
    #[serde(default)]
    pub target_audience: Vec<String>,

    /// Accepted issuers (empty = any issuer)
    #[serde(default)]
    pub trusted_issuers: Vec<String>,

    /// Client-credentials pre-authorization against the introspection endpoint
    #[serde(default)]
    pub pre_authorization: Option<PreAuthorizationConfig>,

    /// Scope strategy name: `exact`, `hierarchic`, `wildcard` or `none`
    #[serde(default)]
    pub scope_strategy: String,

    /// RFC 7662 introspection endpoint
    pub introspection_url: String,

    /// Where the bearer token is read from (default: `Authorization` header)
    #[serde(default)]
    pub token_from: Option<BearerTokenLocation>,

    /// Extra headers sent with every introspection request
    #[serde(default)]
    pub introspection_request_headers: HashMap<String, String>,

    /// Retry tuning, honoured when pre-authorization is enabled
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

/// Pre-authorization (client-credentials) settings
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreAuthorizationConfig {
    /// Whether pre-authorization is active
    #[serde(default)]
    pub enabled: bool,

    /// OAuth2 client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret (supports `env:VAR_NAME`)
    #[serde(default)]
    pub client_secret: String,

    /// Scopes requested for the client-credentials token
    #[serde(default)]
    pub scope: Vec<String>,

    /// Token endpoint
    #[serde(default)]
    pub token_url: String,
}

impl fmt::Debug for PreAuthorizationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreAuthorizationConfig")
            .field("enabled", &self.enabled)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl PreAuthorizationConfig {
    /// Resolve the client secret (expand `env:VAR_NAME`)
    #[must_use]
    pub fn resolve_secret(&self) -> String {
        if let Some(var_name) = self.client_secret.strip_prefix("env:") {
            env::var(var_name).unwrap_or_else(|_| self.client_secret.clone())
        } else {
            self.client_secret.clone()
        }
    }
}

/// Retry tuning as duration strings (`"500ms"`, `"1s"`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Base delay between attempts
    #[serde(default)]
    pub max_delay: String,

    /// Total wait budget before giving up
    #[serde(default)]
    pub give_up_after: String,
}

impl RetryConfig {
    const DEFAULT_MAX_DELAY: &'static str = "500ms";
    const DEFAULT_GIVE_UP_AFTER: &'static str = "1s";

    /// Fill blank fields with defaults and parse both durations once.
    pub fn resolve(retry: Option<&Self>) -> Result<RetryPolicy> {
        let (max_delay, give_up_after) = match retry {
            Some(r) => (
                non_blank(&r.max_delay).unwrap_or(Self::DEFAULT_MAX_DELAY),
                non_blank(&r.give_up_after).unwrap_or(Self::DEFAULT_GIVE_UP_AFTER),
            ),
            None => (Self::DEFAULT_MAX_DELAY, Self::DEFAULT_GIVE_UP_AFTER),
        };

        Ok(RetryPolicy::new(
            parse_duration("retry.max_delay", max_delay)?,
            parse_duration("retry.give_up_after", give_up_after)?,
        ))
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| Error::Config(format!("{field}: invalid duration \"{value}\": {e}")))
}

/// Pre-authorization settings after validation.
///
/// Two equal values produce interchangeable transports, which is what the
/// authenticator's transport cache keys on.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PreAuthorization {
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Requested scopes
    pub scope: Vec<String>,
    /// Token endpoint
    pub token_url: Url,
    /// Retry profile for the pre-authorized transport
    pub retry: RetryPolicy,
}

impl fmt::Debug for PreAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreAuthorization")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("token_url", &self.token_url.as_str())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Validated configuration for one introspection call
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Introspection endpoint
    pub introspection_url: Url,
    /// Required scopes, in configured order
    pub required_scope: Vec<String>,
    /// Required audiences
    pub target_audience: Vec<String>,
    /// Trusted issuers (empty = no issuer check)
    pub trusted_issuers: Vec<String>,
    /// Scope comparison
    pub scope_strategy: ScopeStrategy,
    /// Token location
    pub token_from: Option<BearerTokenLocation>,
    /// Extra request headers
    pub request_headers: HeaderMap,
    /// Pre-authorization, when enabled
    pub pre_authorization: Option<PreAuthorization>,
}

impl IntrospectionConfig {
    /// Validate and resolve defaults.
    ///
    /// Blank retry fields default to 500ms / 1s, and only when
    /// pre-authorization is enabled; otherwise `retry` is ignored.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let introspection_url = parse_absolute_url("introspection_url", &self.introspection_url)?;
        let scope_strategy: ScopeStrategy = self.scope_strategy.parse()?;

        let mut request_headers = HeaderMap::with_capacity(self.introspection_request_headers.len());
        for (name, value) in &self.introspection_request_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::Config(format!("introspection_request_headers: invalid name \"{name}\": {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                Error::Config(format!("introspection_request_headers: invalid value for \"{name}\": {e}"))
            })?;
            request_headers.insert(header_name, header_value);
        }

        let pre_authorization = match &self.pre_authorization {
            Some(pre) if pre.enabled => Some(resolve_pre_authorization(pre, self.retry.as_ref())?),
            _ => None,
        };

        Ok(ResolvedConfig {
            introspection_url,
            required_scope: self.required_scope.clone(),
            target_audience: self.target_audience.clone(),
            trusted_issuers: self.trusted_issuers.clone(),
            scope_strategy,
            token_from: self.token_from.clone(),
            request_headers,
            pre_authorization,
        })
    }
}

fn resolve_pre_authorization(
    pre: &PreAuthorizationConfig,
    retry: Option<&RetryConfig>,
) -> Result<PreAuthorization> {
    if pre.client_id.is_empty() {
        return Err(Error::Config("pre_authorization.client_id is required".to_string()));
    }
    let client_secret = pre.resolve_secret();
    if client_secret.is_empty() {
        return Err(Error::Config("pre_authorization.client_secret is required".to_string()));
    }
    if pre.token_url.is_empty() {
        return Err(Error::Config("pre_authorization.token_url is required".to_string()));
    }

    Ok(PreAuthorization {
        client_id: pre.client_id.clone(),
        client_secret,
        scope: pre.scope.clone(),
        token_url: parse_absolute_url("pre_authorization.token_url", &pre.token_url)?,
        retry: RetryConfig::resolve(retry)?,
    })
}

fn parse_absolute_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|e| Error::Config(format!("{field}: invalid URL \"{value}\": {e}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("{field}: \"{value}\" is not an absolute http(s) URL")));
    }
    Ok(url)
}

/// Per-authenticator switch and global defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthenticatorEntry {
    /// Administrative enable flag
    #[serde(default)]
    pub enabled: bool,

    /// Defaults every rule's configuration is layered over
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Authenticator settings keyed by authenticator identifier.
///
/// This is the configuration collaborator authenticators consult: whether
/// they are enabled, and how a rule's raw configuration decodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthenticatorSettings {
    authenticators: HashMap<String, AuthenticatorEntry>,
}

impl AuthenticatorSettings {
    /// Empty settings (every authenticator disabled)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticator with its enable flag and global defaults
    #[must_use]
    pub fn with(mut self, id: &str, enabled: bool, config: serde_json::Value) -> Self {
        self.authenticators
            .insert(id.to_string(), AuthenticatorEntry { enabled, config });
        self
    }

    /// Check whether an authenticator is administratively enabled
    #[must_use]
    pub fn is_enabled(&self, id: &str) -> bool {
        self.authenticators.get(id).is_some_and(|a| a.enabled)
    }

    /// Decode a rule's raw configuration layered over the global defaults.
    ///
    /// Objects merge key by key; arrays and scalars from the rule replace
    /// the defaults. Empty or `null` raw configuration means "defaults only",
    /// and so does a `null` field at any depth.
    pub fn decode<T: DeserializeOwned>(&self, id: &str, raw: &[u8]) -> Result<T> {
        let mut overrides: serde_json::Value = if raw.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(raw).map_err(|e| Error::Config(format!("{id}: {e}")))?
        };

        let mut figment = Figment::new();
        if let Some(entry) = self.authenticators.get(id) {
            if entry.config.is_object() {
                let mut defaults = entry.config.clone();
                strip_nulls(&mut defaults);
                figment = figment.merge(Serialized::defaults(defaults));
            }
        }
        strip_nulls(&mut overrides);
        match overrides {
            serde_json::Value::Null => {}
            serde_json::Value::Object(_) => {
                figment = figment.merge(Serialized::defaults(overrides));
            }
            _ => {
                return Err(Error::Config(format!("{id}: configuration must be a JSON object")));
            }
        }

        Ok(figment.extract()?)
    }
}

/// Drop `null` object members recursively
fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
