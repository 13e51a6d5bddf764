//! bytescale-cache — windowed metric history and rate computation.
//!
//! Keeps, per workload, a short time-ordered history of a cumulative
//! counter and turns "oldest retained sample" plus "current sample" into
//! the delta an autoscaler scales on.
//!
//! # Architecture
//!
//! ```text
//! SampleStore (Mutex<HashMap<workload_id, VecDeque<MetricSample>>>)
//!   ├── append()  ← monotonic: only strictly greater values are kept
//!   ├── purge()   ← trims the prefix older than the retention window
//!   ├── oldest()  → baseline sample, or CacheError::NotFound
//!   └── record()  → append + purge + oldest under one lock
//!
//! compute_rate(oldest, current, divisor)
//!   └── (current - oldest) / divisor, rejecting regressions and divisor 0
//! ```
//!
//! The store never persists anything; a restart starts from empty
//! histories.

pub mod error;
pub mod rate;
pub mod sample;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use rate::compute_rate;
pub use sample::MetricSample;
pub use store::SampleStore;
