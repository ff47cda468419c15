//! Resilient HTTP transport
//!
//! Wraps a `reqwest` client with bounded retry-with-backoff for
//! connection-level failures. A well-formed HTTP response is returned as-is,
//! whatever its status. When built for pre-authorization, every attempt
//! carries the client-credentials token in its `Authorization` header.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::PreAuthorization;
use crate::failsafe::{RetryPolicy, with_retry};
use crate::oauth::ClientCredentialsSource;
use crate::{Error, Result};

/// Upper bound for a single attempt
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport with retries and optional pre-authorization
pub struct ResilientTransport {
    /// HTTP client
    client: Client,
    /// Retry profile
    policy: RetryPolicy,
    /// Pre-authorization token, if any
    credentials: Option<Arc<ClientCredentialsSource>>,
}

impl ResilientTransport {
    /// Transport with the fixed small latency tolerance profile
    pub fn latency_tolerance_small() -> Result<Self> {
        Self::configurable(RetryPolicy::latency_tolerance_small())
    }

    fn configurable(policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            policy,
            credentials: None,
        })
    }

    /// Transport that authenticates itself with a client-credentials token
    pub fn pre_authorized(pre: &PreAuthorization) -> Result<Self> {
        let client = build_client()?;
        let credentials = Arc::new(ClientCredentialsSource::new(client.clone(), pre));
        Ok(Self {
            client,
            policy: pre.retry,
            credentials: Some(credentials),
        })
    }

    /// Retry profile in use
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Whether requests carry a pre-authorization token
    #[must_use]
    pub fn is_pre_authorized(&self) -> bool {
        self.credentials.is_some()
    }

    /// Start building a request on the underlying client
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request, retrying connection-level failures
    ///
    /// The whole exchange, token fetch and retries included, is bounded by
    /// the policy's `give_up_after`. The request body must be cloneable
    /// (in-memory), which form and JSON bodies always are.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let url = request.url().clone();

        with_retry(&self.policy, url.as_str(), || {
            let attempt = request.try_clone();
            async move {
                let mut attempt =
                    attempt.ok_or_else(|| Error::Internal("request body cannot be retried".to_string()))?;

                if let Some(credentials) = &self.credentials {
                    let token = credentials.token().await?;
                    let value = HeaderValue::from_str(&token.authorization())
                        .map_err(|e| Error::Internal(format!("invalid pre-authorization token: {e}")))?;
                    attempt.headers_mut().insert(AUTHORIZATION, value);
                }

                let response = self.client.execute(attempt).await?;

                if response.status() == StatusCode::UNAUTHORIZED {
                    if let Some(credentials) = &self.credentials {
                        debug!(url = %response.url(), "Pre-authorization token rejected, dropping cached token");
                        credentials.invalidate();
                    }
                }

                Ok::<_, Error>(response)
            }
        })
        .await
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()
        .map_err(|e| Error::Transport(e.to_string()))
}
