//! Error types for external sources.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for source reads.
pub type SourceResult<T> = Result<T, SourceError>;

/// Failures talking to Redis or the Kubernetes API.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// A command failed: error reply, dropped connection or bad value.
    #[error("redis error: {0}")]
    Redis(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("kubernetes error: {0}")]
    Kube(String),
}
