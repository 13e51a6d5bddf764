//! External scaler gRPC server.
//!
//! Implements the KEDA `ExternalScaler` interface on top of
//! [`ScalerHandler`]. Each RPC parses the scaler metadata, delegates, and
//! maps [`ScalerError`](crate::ScalerError) to a gRPC status.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use futures_util::stream;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::handler::ScalerHandler;
use crate::metadata::ScalerMetadata;
use crate::proto;
use crate::proto::external_scaler_server::{ExternalScaler, ExternalScalerServer};

/// Default period between `StreamIsActive` evaluations.
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_secs(30);

type IsActiveStream = Pin<Box<dyn Stream<Item = Result<proto::IsActiveResponse, Status>> + Send>>;

/// gRPC implementation of the external scaler.
pub struct ExternalScalerService {
    handler: Arc<ScalerHandler>,
    stream_interval: Duration,
}

impl ExternalScalerService {
    pub fn new(handler: Arc<ScalerHandler>) -> Self {
        Self {
            handler,
            stream_interval: DEFAULT_STREAM_INTERVAL,
        }
    }

    /// Set the `StreamIsActive` period (at least one millisecond).
    pub fn with_stream_interval(mut self, interval: Duration) -> Self {
        self.stream_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self) -> ExternalScalerServer<Self> {
        ExternalScalerServer::new(self)
    }
}

fn parse_ref(object_ref: &proto::ScaledObjectRef) -> Result<ScalerMetadata, Status> {
    debug!(
        scaled_object = %object_ref.name,
        namespace = %object_ref.namespace,
        "scaler request"
    );
    Ok(ScalerMetadata::parse(&object_ref.scaler_metadata)?)
}

#[tonic::async_trait]
impl ExternalScaler for ExternalScalerService {
    async fn is_active(
        &self,
        request: Request<proto::ScaledObjectRef>,
    ) -> Result<Response<proto::IsActiveResponse>, Status> {
        let metadata = parse_ref(request.get_ref())?;
        let result = self.handler.is_active(&metadata).await?;
        Ok(Response::new(proto::IsActiveResponse { result }))
    }

    type StreamIsActiveStream = IsActiveStream;

    async fn stream_is_active(
        &self,
        request: Request<proto::ScaledObjectRef>,
    ) -> Result<Response<Self::StreamIsActiveStream>, Status> {
        let metadata = parse_ref(request.get_ref())?;
        let ticker = tokio::time::interval(self.stream_interval);
        let state = Some((self.handler.clone(), metadata, ticker));

        // The first tick fires immediately. An error ends the stream.
        let updates = stream::unfold(state, |state| async move {
            let (handler, metadata, mut ticker) = state?;
            ticker.tick().await;
            match handler.is_active(&metadata).await {
                Ok(result) => Some((
                    Ok(proto::IsActiveResponse { result }),
                    Some((handler, metadata, ticker)),
                )),
                Err(e) => {
                    warn!(deployment = %metadata.deployment_id, error = %e, "streamIsActive stopped");
                    Some((Err(Status::from(e)), None))
                }
            }
        });

        Ok(Response::new(Box::pin(updates)))
    }

    async fn get_metric_spec(
        &self,
        request: Request<proto::ScaledObjectRef>,
    ) -> Result<Response<proto::GetMetricSpecResponse>, Status> {
        let metadata = parse_ref(request.get_ref())?;
        let target = self.handler.metric_spec(&metadata);

        Ok(Response::new(proto::GetMetricSpecResponse {
            metric_specs: vec![proto::MetricSpec {
                metric_name: target.metric_name,
                target_size: target.target_value,
            }],
        }))
    }

    async fn get_metrics(
        &self,
        request: Request<proto::GetMetricsRequest>,
    ) -> Result<Response<proto::GetMetricsResponse>, Status> {
        let req = request.into_inner();
        let object_ref = req
            .scaled_object_ref
            .ok_or_else(|| Status::invalid_argument("missing scaledObjectRef"))?;
        let metadata = parse_ref(&object_ref)?;

        let metric_value = self.handler.metrics(&metadata, &req.metric_name).await?;

        Ok(Response::new(proto::GetMetricsResponse {
            metric_values: vec![proto::MetricValue {
                metric_name: req.metric_name,
                metric_value,
            }],
        }))
    }
}
