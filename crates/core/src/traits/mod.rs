//! Collaborator traits of the resolution engine
//!
//! The engine calls out to these seams and ships simple implementations:
//!
//! ```text
//! Lookup:
//!   - DomainResolver: domain name -> value, plus active change sets
//!   - DomainValues: positional domain values for writes
//!
//! Construction:
//!   - DomainSpecificValueFactory: builds overrides, optionally interning strings
//!
//! Storage:
//!   - Persistence: load / store / remove / reload of key values
//! ```

mod domain_resolver;
mod domain_values;
mod factory;
mod persistence;

pub use domain_resolver::{DomainResolver, MapBackedDomainResolver};
pub use domain_values::{DomainValues, MapBackedDomainValues};
pub use factory::{
    DefaultDomainSpecificValueFactory, DomainSpecificValueFactory,
    InterningDomainSpecificValueFactory, SharedFactory,
};
pub use persistence::{Persistence, SharedPersistence};
