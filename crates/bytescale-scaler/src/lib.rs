//! bytescale-scaler — the KEDA external scaler service.
//!
//! Maps the three scaler questions onto the metric cache and the external
//! sources.
//!
//! # Architecture
//!
//! ```text
//! ExternalScalerService (tonic)
//!   ├── IsActive()       → ScalerHandler::is_active   (append + purge as a side effect)
//!   ├── StreamIsActive() → is_active on an interval
//!   ├── GetMetricSpec()  → ScalerHandler::metric_spec (metadata only)
//!   └── GetMetrics()     → ScalerHandler::metrics     (record + compute_rate)
//!
//! ScalerHandler
//!   ├── SampleStore       (shared, one lock per request)
//!   ├── KeyValueSource    (current counter, last-update timestamp)
//!   └── PodCounter        (optional per-pod normalization)
//! ```
//!
//! Scaler metadata is parsed into a typed [`ScalerMetadata`] once per
//! request; errors surface as gRPC statuses via [`ScalerError`].

pub mod error;
pub mod handler;
pub mod keys;
pub mod metadata;
pub mod server;

/// Generated protobuf types and gRPC service stubs.
pub mod proto {
    tonic::include_proto!("externalscaler");
}

pub use error::{ScalerError, ScalerResult};
pub use handler::{MetricTarget, ScalerHandler};
pub use keys::KeyTemplates;
pub use metadata::ScalerMetadata;
pub use server::ExternalScalerService;
