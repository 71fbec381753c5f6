//! Structured error types for resource registration and removal
//!
//! These cover the synchronous contract violations raised directly to the
//! caller of the offending call. Per-resource cleanup failures are never
//! raised as errors; they are collected into [`CleanupReport`] instead.
//!
//! [`CleanupReport`]: crate::cleanup::CleanupReport

use thiserror::Error;

/// Main error type for registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("resource '{id}' is already registered")]
    DuplicateResource { id: String },

    #[error("resource '{id}' depends on unknown resource '{dependency}'")]
    UnknownDependency { id: String, dependency: String },

    #[error("resource registry is full (limit: {max} resources)")]
    CapacityExceeded { max: usize },

    #[error("resource '{id}' cannot be unregistered: {} active dependent(s) remain ({})", dependents.len(), dependents.join(", "))]
    LiveDependents { id: String, dependents: Vec<String> },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_resource() {
        let err = RegistryError::DuplicateResource {
            id: "db-main".to_string(),
        };
        assert!(err.to_string().contains("db-main"));

        let err = RegistryError::LiveDependents {
            id: "db".to_string(),
            dependents: vec!["cache".to_string(), "worker".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 active dependent(s)"));
        assert!(msg.contains("cache, worker"));
    }
}
