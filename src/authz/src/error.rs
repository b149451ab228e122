//! Error types for the authorization engine

use crate::alias::AliasError;
use thiserror::Error;

/// Authorization engine errors
///
/// Every variant except `Forbidden` is raised while building rules or
/// configuring an engine. Permission checks themselves never fail.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Invalid rule definition
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Alias map rejected at construction
    #[error("Alias error: {0}")]
    Alias(#[from] AliasError),

    /// Field pattern that could not be compiled
    #[error("Invalid field pattern: {0}")]
    InvalidPattern(String),

    /// Engine configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rule exchange format error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Access denied, raised only by `PermissionEngine::authorize`
    #[error("{message}")]
    Forbidden {
        action: String,
        subject_type: Option<String>,
        field: Option<String>,
        message: String,
    },
}

impl AuthzError {
    /// Whether this error is an access denial rather than a configuration error
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
