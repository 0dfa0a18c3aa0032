//! # Error Types
//!
//! Errors raised at the boundary between the pool and its collaborators.
//! Errors that belong to the pool itself live in the implementation crate.

use thiserror::Error;

/// Failure reported by a [`ResourceFactory`](crate::resource::ResourceFactory).
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The external resource could not be instantiated, e.g. because an
    /// external license or instance limit was hit.
    #[error("Resource creation failed: {0}")]
    Creation(String),

    /// The transit form could not be turned back into a live reference.
    #[error("Resource transfer failed: {0}")]
    Transfer(String),

    #[error("Resource error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Errors related to notifications and inbound control messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Either message or state should be set")]
    MissingBody,

    #[error("Only one of message or state may be set")]
    AmbiguousBody,
}
