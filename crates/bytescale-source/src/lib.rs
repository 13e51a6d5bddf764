//! bytescale-source — the external reads behind every scaler request.
//!
//! Two narrow capabilities, each a trait with a production and an
//! in-memory implementation:
//!
//! ```text
//! KeyValueSource::get(key) -> Option<String>
//!   ├── RedisClient   (multiplexed connection, lazy reconnect, bounded by timeout)
//!   └── MemorySource  (HashMap, tests and local runs)
//!
//! PodCounter::count_pods(namespace, prefixes) -> u64
//!   └── KubePodCounter (Running pods whose name starts with a prefix)
//! ```

pub mod error;
pub mod kv;
pub mod pods;
pub mod redis;

pub use error::{SourceError, SourceResult};
pub use kv::{KeyValueSource, MemorySource};
pub use pods::{KubePodCounter, PodCounter};
pub use redis::{RedisClient, RedisConfig};
