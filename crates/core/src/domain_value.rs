//! A single domain-specific override
//!
//! A `DomainSpecificValue` binds a value to a pattern of domain values
//! (`DE|*|mobile|`) and optionally to a change set. Its ordering is derived
//! from the pattern: bit 0 is always set and every literal token at 1-based
//! position `i` sets bit `i`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{ResolverError, Result};
use crate::matcher::Matcher;
use crate::value::Value;
use crate::Payload;

/// Separator between the domain values of a pattern
pub const DOMAIN_SEPARATOR: char = '|';

/// Token matching any value of a domain
pub const WILDCARD: &str = "*";

/// One override of a key's value
#[derive(Debug, Clone)]
pub struct DomainSpecificValue<V = Value> {
    pattern: Arc<str>,
    ordering: u64,
    change_set: Option<Arc<str>>,
    value: V,
    matcher: Matcher,
}

impl<V: Payload> DomainSpecificValue<V> {
    /// Build an override from positional domain values.
    ///
    /// Blank tokens become wildcards, others are kept verbatim. No tokens yields the default value
    /// with an empty pattern.
    pub fn create<S: AsRef<str>>(value: V, change_set: Option<&str>, domain_values: &[S]) -> Result<Self> {
        let mut pattern = String::with_capacity(domain_values.len() * 8);
        for token in domain_values {
            let token = token.as_ref();
            if token.contains(DOMAIN_SEPARATOR) {
                return Err(ResolverError::invalid_argument(format!(
                    "domain value '{}' must not contain '{}'",
                    token, DOMAIN_SEPARATOR
                )));
            }
            pattern.push_str(if token.trim().is_empty() { WILDCARD } else { token });
            pattern.push(DOMAIN_SEPARATOR);
        }
        Self::build(value, change_set, pattern)
    }

    /// Build an override from a stored pattern string.
    ///
    /// A blank pattern is the default value; anything else has to end with
    /// the separator.
    pub fn from_pattern(value: V, change_set: Option<&str>, pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Self::build(value, change_set, String::new());
        }
        if !pattern.ends_with(DOMAIN_SEPARATOR) {
            return Err(ResolverError::InvalidPattern(format!(
                "pattern '{}' must end with '{}'",
                pattern, DOMAIN_SEPARATOR
            )));
        }
        Self::build(value, change_set, pattern.to_string())
    }

    fn build(value: V, change_set: Option<&str>, pattern: String) -> Result<Self> {
        let ordering = ordering_of(&pattern)?;
        let matcher = Matcher::for_pattern(&pattern)?;
        Ok(Self {
            pattern: Arc::from(pattern),
            ordering,
            change_set: change_set.map(Arc::from),
            value,
            matcher,
        })
    }

    /// Swap the shared strings for interned copies
    pub fn into_interned<F>(mut self, mut intern: F) -> Self
    where
        F: FnMut(&str) -> Arc<str>,
    {
        self.pattern = intern(&self.pattern);
        self.change_set = self.change_set.map(|cs| intern(&cs));
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn pattern_arc(&self) -> &Arc<str> {
        &self.pattern
    }

    pub fn ordering(&self) -> u64 {
        self.ordering
    }

    pub fn change_set(&self) -> Option<&str> {
        self.change_set.as_deref()
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    /// Replace the payload; pattern and change set stay untouched
    pub fn set_value(&mut self, value: V) {
        self.value = value;
    }

    pub fn is_default(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn has_change_set(&self) -> bool {
        self.change_set.is_some()
    }

    pub fn change_set_is(&self, change_set: Option<&str>) -> bool {
        self.change_set() == change_set
    }

    /// Tokens of the pattern, empty for the default value
    pub fn domain_values(&self) -> Vec<&str> {
        match self.pattern.strip_suffix(DOMAIN_SEPARATOR) {
            Some(body) => body.split(DOMAIN_SEPARATOR).collect(),
            None => Vec::new(),
        }
    }

    /// Whether this override applies to `domain_str` (`v1|v2|...|`)
    pub fn pattern_matches(&self, domain_str: &str) -> bool {
        self.matcher.matches(domain_str)
    }

    /// Values without change set are always active
    pub fn is_in_change_sets<S: AsRef<str>>(&self, active: &[S]) -> bool {
        match self.change_set() {
            None => true,
            Some(name) => active.iter().any(|a| a.as_ref() == name),
        }
    }

    /// Query-side match: the pattern itself is tested against a query matcher
    pub fn matches_query<S: AsRef<str>>(&self, matcher: &Matcher, active: &[S]) -> bool {
        self.is_in_change_sets(active) && matcher.matches(&self.pattern)
    }

    /// Resolution order, most specific first.
    ///
    /// Higher ordering wins. On a tie, values with a change set come first
    /// (change sets compared by name) and the pattern decides the rest.
    /// Two values comparing `Equal` occupy the same slot of a key.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        other
            .ordering
            .cmp(&self.ordering)
            .then_with(|| match (&self.change_set, &other.change_set) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.pattern.cmp(&other.pattern))
    }
}

impl<V: PartialEq> PartialEq for DomainSpecificValue<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ordering == other.ordering
            && self.pattern == other.pattern
            && self.value == other.value
            && self.change_set == other.change_set
    }
}

impl<V: fmt::Display> fmt::Display for DomainSpecificValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainSpecificValue{{pattern=\"{}\", ordering={}", self.pattern, self.ordering)?;
        if let Some(change_set) = &self.change_set {
            write!(f, ", changeSet=\"{}\"", change_set)?;
        }
        write!(f, ", value=\"{}\"}}", self.value)
    }
}

fn ordering_of(pattern: &str) -> Result<u64> {
    let Some(body) = pattern.strip_suffix(DOMAIN_SEPARATOR) else {
        return Ok(1);
    };
    let mut ordering = 1u64;
    for (index, token) in body.split(DOMAIN_SEPARATOR).enumerate() {
        if token == WILDCARD {
            continue;
        }
        let bit = u32::try_from(index + 1)
            .ok()
            .and_then(|shift| 1u64.checked_shl(shift))
            .ok_or_else(|| {
                ResolverError::invalid_argument(format!(
                    "pattern '{}' has more domain values than supported",
                    pattern
                ))
            })?;
        ordering |= bit;
    }
    Ok(ordering)
}
