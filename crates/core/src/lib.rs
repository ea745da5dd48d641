//! Core types for the domain-specific key/value resolver
//!
//! This crate contains the resolution engine used by all other crates:
//! - `Value` payload and typed extraction
//! - `DomainSpecificValue`: a single override with its precedence
//! - `Matcher`: exact-prefix and wildcard matching of domain strings
//! - `KeyValues`: all overrides of one key plus the best-match search
//! - `ValuesStore`: the concurrent key map with persistence load-through
//! - Collaborator traits (domain resolvers, persistence, DSV factories)
//! - Error types and `metrics` counters

pub mod domain_value;
pub mod error;
pub mod key_values;
pub mod matcher;
pub mod stats;
pub mod store;
pub mod traits;
pub mod value;

pub use domain_value::{DomainSpecificValue, DOMAIN_SEPARATOR, WILDCARD};
pub use error::{PersistenceError, ResolverError, Result};
pub use key_values::KeyValues;
pub use matcher::Matcher;
pub use store::ValuesStore;
pub use value::{Value, ValueTypeError};

pub use traits::{
    DefaultDomainSpecificValueFactory, DomainResolver, DomainSpecificValueFactory, DomainValues,
    InterningDomainSpecificValueFactory, MapBackedDomainResolver, MapBackedDomainValues,
    Persistence, SharedFactory, SharedPersistence,
};

use std::fmt;

/// Bounds every stored payload has to satisfy.
///
/// The engine never inspects a payload. It only clones it out on lookup,
/// compares it for DSV equality and prints it in dumps.
pub trait Payload: Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {}
