//! Scope comparison strategies
//!
//! A strategy decides whether the scopes granted to a token satisfy one
//! required scope. Strategies are resolved once, when the authenticator
//! configuration is parsed; an unknown name is a configuration error.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Comparison semantics for granted vs. required scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeStrategy {
    /// Scope checking is delegated to the introspection endpoint
    #[default]
    Disabled,
    /// Granted list must contain the required scope verbatim
    Exact,
    /// `a.b` grants `a.b` and every descendant such as `a.b.c`
    Hierarchic,
    /// Granted scopes may contain `*` segments
    Wildcard,
}

impl ScopeStrategy {
    /// Check whether `granted` satisfies `required`.
    ///
    /// Returns `None` when the strategy is disabled and the check must not
    /// happen client-side.
    #[must_use]
    pub fn matcher(self) -> Option<fn(&[&str], &str) -> bool> {
        match self {
            Self::Disabled => None,
            Self::Exact => Some(exact),
            Self::Hierarchic => Some(hierarchic),
            Self::Wildcard => Some(wildcard),
        }
    }

    /// Whether scopes are checked locally after introspection
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != Self::Disabled
    }
}

impl FromStr for ScopeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::Disabled),
            "exact" => Ok(Self::Exact),
            "hierarchic" => Ok(Self::Hierarchic),
            "wildcard" => Ok(Self::Wildcard),
            other => Err(Error::Config(format!("unknown scope strategy \"{other}\""))),
        }
    }
}

impl fmt::Display for ScopeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "none",
            Self::Exact => "exact",
            Self::Hierarchic => "hierarchic",
            Self::Wildcard => "wildcard",
        })
    }
}

fn exact(granted: &[&str], required: &str) -> bool {
    granted.contains(&required)
}

fn hierarchic(granted: &[&str], required: &str) -> bool {
    let needle: Vec<&str> = required.split('.').collect();
    granted.iter().any(|scope| {
        if *scope == required {
            return true;
        }
        let prefix: Vec<&str> = scope.split('.').collect();
        prefix.len() < needle.len() && needle.starts_with(&prefix)
    })
}

fn wildcard(granted: &[&str], required: &str) -> bool {
    let needle: Vec<&str> = required.split('.').collect();
    granted.iter().any(|pattern| {
        let parts: Vec<&str> = pattern.split('.').collect();
        if parts.len() > needle.len() {
            return false;
        }
        let last = parts.len() - 1;
        parts.iter().enumerate().all(|(i, part)| {
            // A trailing `*` swallows the rest of a longer needle.
            if i == last && parts.len() != needle.len() {
                return *part == "*" && !needle[i].is_empty();
            }
            if *part == "*" {
                !needle[i].is_empty()
            } else {
                *part == needle[i]
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_strategies() {
        assert_eq!("exact".parse::<ScopeStrategy>().unwrap(), ScopeStrategy::Exact);
        assert_eq!("Hierarchic".parse::<ScopeStrategy>().unwrap(), ScopeStrategy::Hierarchic);
        assert_eq!("wildcard".parse::<ScopeStrategy>().unwrap(), ScopeStrategy::Wildcard);
        assert_eq!("none".parse::<ScopeStrategy>().unwrap(), ScopeStrategy::Disabled);
        assert_eq!("".parse::<ScopeStrategy>().unwrap(), ScopeStrategy::Disabled);
    }

    #[test]
    fn unknown_strategy_is_config_error() {
        let err = "fuzzy".parse::<ScopeStrategy>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("fuzzy"));
    }

    #[test]
    fn disabled_has_no_matcher() {
        assert!(ScopeStrategy::Disabled.matcher().is_none());
        assert!(!ScopeStrategy::Disabled.is_enabled());
    }

    #[test]
    fn exact_requires_verbatim_match() {
        let granted = ["read", "write"];
        assert!(exact(&granted, "read"));
        assert!(!exact(&granted, "read.all"));
        assert!(!exact(&granted, "admin"));
    }

    #[test]
    fn hierarchic_grants_descendants_only() {
        let granted = ["users.read", "billing"];
        assert!(hierarchic(&granted, "users.read"));
        assert!(hierarchic(&granted, "users.read.self"));
        assert!(hierarchic(&granted, "billing.invoices"));
        assert!(!hierarchic(&granted, "users"));
        assert!(!hierarchic(&granted, "users.write"));
        assert!(!hierarchic(&granted, "billingx"));
    }

    #[test]
    fn wildcard_matches_single_segments() {
        let granted = ["users.*.read"];
        assert!(wildcard(&granted, "users.42.read"));
        assert!(!wildcard(&granted, "users.42.write"));
        assert!(!wildcard(&granted, "users.read"));
    }

    #[test]
    fn wildcard_trailing_star_matches_rest() {
        let granted = ["users.*"];
        assert!(wildcard(&granted, "users.read"));
        assert!(wildcard(&granted, "users.read.self"));
        assert!(!wildcard(&granted, "users"));
        assert!(!wildcard(&granted, "orders.read"));
    }

    #[test]
    fn wildcard_without_star_is_exact() {
        let granted = ["users.read"];
        assert!(wildcard(&granted, "users.read"));
        assert!(!wildcard(&granted, "users.read.self"));
    }

    #[test]
    fn empty_grant_list_never_matches() {
        for strategy in [ScopeStrategy::Exact, ScopeStrategy::Hierarchic, ScopeStrategy::Wildcard] {
            let matcher = strategy.matcher().unwrap();
            assert!(!matcher(&[], "read"), "{strategy} matched an empty grant");
        }
    }
}
