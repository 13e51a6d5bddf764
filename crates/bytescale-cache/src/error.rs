//! Error types for the metric cache.

use thiserror::Error;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced by the sample store and the rate computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// No baseline sample is cached for the workload (never appended, or
    /// every sample aged out).
    #[error("no cached samples for workload '{0}'")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
