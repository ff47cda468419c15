//! Bearer token extraction
//!
//! Pulls the credential an authenticator should inspect from a configurable
//! request location: a header, a query parameter or a cookie. Without an
//! explicit location the `Authorization: Bearer <token>` header is used.

use axum::http::{HeaderMap, header, request::Parts};
use serde::{Deserialize, Serialize};

/// Where to look for the bearer token (`token_from`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum BearerTokenLocation {
    /// A request header; `Authorization` is parsed as `Bearer <token>`
    Header(String),
    /// A URL query parameter
    QueryParameter(String),
    /// A cookie
    Cookie(String),
}

/// Extract the bearer token from request parts.
///
/// Returns `None` when nothing usable is present at the configured location.
#[must_use]
pub fn token_from_request(parts: &Parts, location: Option<&BearerTokenLocation>) -> Option<String> {
    let token = match location {
        None => authorization_bearer(&parts.headers),
        Some(BearerTokenLocation::Header(name)) if name.eq_ignore_ascii_case("authorization") => {
            authorization_bearer(&parts.headers)
        }
        Some(BearerTokenLocation::Header(name)) => parts
            .headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        Some(BearerTokenLocation::QueryParameter(name)) => parts.uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == name.as_str())
                .map(|(_, value)| value.into_owned())
        }),
        Some(BearerTokenLocation::Cookie(name)) => cookie(&parts.headers, name),
    };

    token.filter(|t| !t.is_empty())
}

fn authorization_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.to_string())
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn default_location_reads_bearer_header() {
        let p = parts(Request::builder().header("Authorization", "Bearer abc"));
        assert_eq!(token_from_request(&p, None).as_deref(), Some("abc"));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let p = parts(Request::builder().header("Authorization", "bEaReR abc"));
        assert_eq!(token_from_request(&p, None).as_deref(), Some("abc"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let p = parts(Request::builder().header("Authorization", "Basic dXNlcjpwYXNz"));
        assert_eq!(token_from_request(&p, None), None);

        let p = parts(Request::builder().header("Authorization", "Bearer"));
        assert_eq!(token_from_request(&p, None), None);
    }

    #[test]
    fn missing_header_yields_none() {
        let p = parts(Request::builder());
        assert_eq!(token_from_request(&p, None), None);
    }

    #[test]
    fn custom_header_is_read_verbatim() {
        let p = parts(Request::builder().header("X-Token", "raw-token"));
        let loc = BearerTokenLocation::Header("x-token".into());
        assert_eq!(token_from_request(&p, Some(&loc)).as_deref(), Some("raw-token"));
    }

    #[test]
    fn authorization_header_location_still_parses_bearer() {
        let p = parts(Request::builder().header("Authorization", "Bearer abc"));
        let loc = BearerTokenLocation::Header("Authorization".into());
        assert_eq!(token_from_request(&p, Some(&loc)).as_deref(), Some("abc"));
    }

    #[test]
    fn query_parameter_is_decoded() {
        let p = parts(Request::builder().uri("/api?x=1&access_token=a%2Bb"));
        let loc = BearerTokenLocation::QueryParameter("access_token".into());
        assert_eq!(token_from_request(&p, Some(&loc)).as_deref(), Some("a+b"));
    }

    #[test]
    fn empty_query_parameter_is_absent() {
        let p = parts(Request::builder().uri("/api?access_token="));
        let loc = BearerTokenLocation::QueryParameter("access_token".into());
        assert_eq!(token_from_request(&p, Some(&loc)), None);
    }

    #[test]
    fn cookie_is_found_among_others() {
        let p = parts(Request::builder().header("Cookie", "theme=dark; session=xyz; lang=en"));
        let loc = BearerTokenLocation::Cookie("session".into());
        assert_eq!(token_from_request(&p, Some(&loc)).as_deref(), Some("xyz"));

        let loc = BearerTokenLocation::Cookie("missing".into());
        assert_eq!(token_from_request(&p, Some(&loc)), None);
    }

    #[test]
    fn location_deserializes_from_tagged_object() {
        let loc: BearerTokenLocation =
            serde_json::from_str(r#"{"query_parameter":"token"}"#).unwrap();
        assert_eq!(loc, BearerTokenLocation::QueryParameter("token".into()));
    }
}
