//! Process configuration: command-line flags with environment fallbacks.

use std::net::SocketAddr;
use std::time::Duration;

use bytescale_scaler::KeyTemplates;
use bytescale_scaler::keys::{DEFAULT_LAST_UPDATE_PREFIX_TEMPLATE, DEFAULT_METRICS_PREFIX_TEMPLATE};
use bytescale_source::RedisConfig;
use clap::{Parser, ValueEnum};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "bytescaled", version, about = "KEDA external scaler for cumulative counters")]
pub struct Cli {
    /// gRPC listen address.
    #[arg(long, env = "GRPC_ADDRESS", default_value = "0.0.0.0:50051")]
    pub listen: SocketAddr,

    #[arg(long, env = "REDIS_HOST", default_value = "0.0.0.0")]
    pub redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    /// Redis logical database. Unparsable values fall back to 0.
    #[arg(long, env = "REDIS_DB", default_value = "0")]
    pub redis_db: String,

    /// Bound on Redis connect and command round-trips, in milliseconds.
    #[arg(long, env = "REDIS_TIMEOUT_MS", default_value_t = 2000)]
    pub redis_timeout_ms: u64,

    /// Key of the last-update timestamp; `deploymentid` is replaced by the workload id.
    #[arg(long, env = "LAST_UPDATE_PREFIX_TEMPLATE", default_value = DEFAULT_LAST_UPDATE_PREFIX_TEMPLATE)]
    pub last_update_prefix_template: String,

    /// Prefix of the counter keys; `deploymentid` is replaced by the workload id.
    #[arg(long, env = "METRICS_PREFIX_TEMPLATE", default_value = DEFAULT_METRICS_PREFIX_TEMPLATE)]
    pub metrics_prefix_template: String,

    /// Seconds between StreamIsActive evaluations.
    #[arg(long, env = "STREAM_IS_ACTIVE_INTERVAL_SECONDS", default_value_t = 30)]
    pub stream_interval_secs: u64,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn redis_config(&self) -> RedisConfig {
        let db = self.redis_db.trim().parse().unwrap_or_else(|e| {
            warn!(redis_db = %self.redis_db, error = %e, "invalid redis db, using 0");
            0
        });

        RedisConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            db,
            timeout: Duration::from_millis(self.redis_timeout_ms),
        }
    }

    pub fn key_templates(&self) -> KeyTemplates {
        KeyTemplates {
            last_update_prefix: self.last_update_prefix_template.clone(),
            metrics_prefix: self.metrics_prefix_template.clone(),
        }
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_secs(self.stream_interval_secs.max(1))
    }
}
