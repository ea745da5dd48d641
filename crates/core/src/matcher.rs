//! Domain string matching
//!
//! Two matchers exist:
//! - `ExactPrefix` for stored patterns without a wildcard. The domain string
//!   only has to start with the pattern, so a query naming more domains than
//!   the override still hits it.
//! - `Wildcard` for everything else: a compiled, fully anchored regex.
//!
//! Stored patterns are turned into matchers by [`Matcher::for_pattern`].
//! Best-match queries build their matcher from a resolver with
//! [`Matcher::for_query`] and run it against stored patterns instead of
//! domain strings.

use regex::Regex;

use crate::domain_value::{DOMAIN_SEPARATOR, WILDCARD};
use crate::error::{ResolverError, Result};
use crate::traits::DomainResolver;

/// Regex fragment for "any single domain value"
const ANY_SLOT: &str = "[^|]*";
/// `ANY_SLOT` followed by an escaped separator
const OPEN_SLOT: &str = r"[^|]*\|";

/// Matches domain strings (or patterns) against a compiled rule
#[derive(Debug, Clone)]
pub enum Matcher {
    ExactPrefix(String),
    Wildcard(Regex),
}

impl Matcher {
    /// Matcher for a stored override pattern such as `DE|*|mobile|`
    pub fn for_pattern(pattern: &str) -> Result<Self> {
        if !pattern.contains(WILDCARD) {
            return Ok(Self::ExactPrefix(pattern.to_string()));
        }
        let body = pattern
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(ANY_SLOT);
        Self::anchored(&format!("{}.*", body))
    }

    /// Matcher over stored patterns for the domain values supplied by `resolver`.
    ///
    /// Per domain slot:
    /// - no value: any token
    /// - `*`: only a literal wildcard token
    /// - value containing the separator: alternation of its parts
    /// - otherwise the literal value, or also a wildcard token when
    ///   `with_wildcards` is set
    ///
    /// Open slots at the end are collapsed into the trailing `.*`. With
    /// wildcards the empty (default) pattern matches as well.
    pub fn for_query(
        domains: &[String],
        with_wildcards: bool,
        resolver: &dyn DomainResolver,
    ) -> Result<Self> {
        let mut body = String::new();
        for domain in domains {
            match resolver.domain_value(domain) {
                None => body.push_str(ANY_SLOT),
                Some(value) if value == WILDCARD => body.push_str(r"\*"),
                Some(value) if value.contains(DOMAIN_SEPARATOR) => {
                    let parts = value
                        .split(DOMAIN_SEPARATOR)
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join("|");
                    body.push_str(&format!("(?:{})", parts));
                }
                Some(value) if with_wildcards => {
                    body.push_str(&format!(r"(?:{}|\*)", regex::escape(&value)));
                }
                Some(value) => body.push_str(&regex::escape(&value)),
            }
            body.push_str(r"\|");
        }
        while body.ends_with(OPEN_SLOT) {
            body.truncate(body.len() - OPEN_SLOT.len());
        }
        body.push_str(".*");
        if with_wildcards {
            Self::anchored(&format!("{}|", body))
        } else {
            Self::anchored(&body)
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::ExactPrefix(prefix) => candidate.starts_with(prefix.as_str()),
            Self::Wildcard(regex) => regex.is_match(candidate),
        }
    }

    /// Source of the underlying rule, for diagnostics
    pub fn as_str(&self) -> &str {
        match self {
            Self::ExactPrefix(prefix) => prefix,
            Self::Wildcard(regex) => regex.as_str(),
        }
    }

    fn anchored(expression: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{})$", expression))
            .map(Self::Wildcard)
            .map_err(|e| ResolverError::InvalidPattern(e.to_string()))
    }
}
