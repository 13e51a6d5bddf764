//! bytescaled — the bytescale daemon.
//!
//! Wires the Redis source, the Kubernetes pod counter and the sample cache
//! into the KEDA external scaler gRPC service.
//!
//! # Usage
//!
//! ```text
//! REDIS_HOST=redis.storage bytescaled --listen 0.0.0.0:50051
//! ```

mod config;

use std::sync::Arc;

use bytescale_scaler::{ExternalScalerService, ScalerHandler};
use bytescale_source::{KubePodCounter, RedisClient};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!(
        listen = %cli.listen,
        log_level = %cli.log_level,
        "bytescaled starting"
    );

    let redis_config = cli.redis_config();
    info!(
        addr = %redis_config.address(),
        db = redis_config.db,
        "redis source configured"
    );
    let redis = RedisClient::new(redis_config)?;
    if let Err(e) = redis.ping().await {
        // Not fatal: the client reconnects on the next request.
        warn!(error = %e, "redis not reachable at startup");
    }

    let pods = KubePodCounter::from_default_config().await;
    info!(available = pods.is_available(), "kubernetes pod counter initialized");

    let handler = Arc::new(ScalerHandler::new(
        Arc::new(redis),
        Arc::new(pods),
        cli.key_templates(),
    ));
    let service = ExternalScalerService::new(handler).with_stream_interval(cli.stream_interval());

    info!(addr = %cli.listen, "gRPC server listening");

    tonic::transport::Server::builder()
        .add_service(service.into_service())
        .serve_with_shutdown(cli.listen, shutdown_signal())
        .await?;

    info!("bytescaled stopped");
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
