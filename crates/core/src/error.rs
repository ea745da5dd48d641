//! Error types for the resolver core

use thiserror::Error;

/// Errors raised by the resolution engine and the values store
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Blank key, blank domain name, separator inside a domain value,
    /// or domains requested without a resolver
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Pattern string that cannot be turned into an override
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Stored value cannot be converted to the requested type
    #[error("Value for key '{key}' is not convertible to {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Failure reported by the persistence collaborator
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ResolverError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Errors reported by persistence backends
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
