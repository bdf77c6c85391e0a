//! Error types for the cluster layer.

use shoplist_storage::StorageError;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur in cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Network error (connection refused, reset, unreachable).
    #[error("network error: {0}")]
    Network(String),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Protocol error (unexpected status or reply kind, malformed payload).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Too few replicas answered.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The peer refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// A local task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClusterError {
    /// True for failures that say nothing about the peer's health beyond
    /// "could not be reached in time".
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}
