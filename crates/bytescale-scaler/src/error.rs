//! Scaler errors and their gRPC status mapping.

use bytescale_cache::CacheError;
use bytescale_source::SourceError;
use thiserror::Error;
use tonic::Status;

/// Result type alias for scaler operations.
pub type ScalerResult<T> = Result<T, ScalerError>;

/// Request-level failure, one variant per status code returned to KEDA.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalerError {
    /// No baseline sample yet.
    #[error("{0}")]
    NotFound(String),

    /// Bad metadata, metric name mismatch, or a counter regression.
    #[error("{0}")]
    InvalidArgument(String),

    /// An external source failed or a required key is missing.
    #[error("{0}")]
    Internal(String),
}

impl From<CacheError> for ScalerError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::NotFound(_) => Self::NotFound(e.to_string()),
            CacheError::InvalidArgument(msg) => Self::InvalidArgument(msg),
        }
    }
}

impl From<SourceError> for ScalerError {
    fn from(e: SourceError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<ScalerError> for Status {
    fn from(e: ScalerError) -> Self {
        match e {
            ScalerError::NotFound(msg) => Status::not_found(msg),
            ScalerError::InvalidArgument(msg) => Status::invalid_argument(msg),
            ScalerError::Internal(msg) => Status::internal(msg),
        }
    }
}
