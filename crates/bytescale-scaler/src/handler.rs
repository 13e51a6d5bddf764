//! Scaler request handling.
//!
//! Each handler method fetches what it needs from the external sources
//! first, then touches the [`SampleStore`] in one synchronous section, so
//! the store lock is never held across I/O.

use std::sync::Arc;

use bytescale_cache::{CacheError, MetricSample, SampleStore, compute_rate};
use bytescale_source::{KeyValueSource, PodCounter};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{ScalerError, ScalerResult};
use crate::keys::{KeyTemplates, parse_timestamp};
use crate::metadata::{KEY_SCALE_METRIC_NAME, ScalerMetadata};

/// The metric a workload scales on and its target per replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTarget {
    pub metric_name: String,
    pub target_value: i64,
}

/// Answers the scaler questions for one process.
pub struct ScalerHandler {
    store: Arc<SampleStore>,
    source: Arc<dyn KeyValueSource>,
    pods: Arc<dyn PodCounter>,
    keys: KeyTemplates,
}

impl ScalerHandler {
    /// Create a handler with an empty sample store.
    pub fn new(
        source: Arc<dyn KeyValueSource>,
        pods: Arc<dyn PodCounter>,
        keys: KeyTemplates,
    ) -> Self {
        Self {
            store: Arc::new(SampleStore::new()),
            source,
            pods,
            keys,
        }
    }

    /// Use an existing store (shared with another component or a test).
    pub fn with_store(mut self, store: Arc<SampleStore>) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// Decide whether the workload is active.
    ///
    /// Feeds the current counter into the sample history and purges it
    /// as a side effect, so periodic activity polls keep the baseline
    /// fresh between metric reads.
    pub async fn is_active(&self, metadata: &ScalerMetadata) -> ScalerResult<bool> {
        let last_update = self.last_update(metadata).await?;
        let current = self.current_value(metadata).await?;

        let now = Utc::now();
        let id = metadata.deployment_id.as_str();
        let cached = self
            .store
            .observe_at(id, current, metadata.scale_period_secs, now);

        let idle_secs = now.signed_duration_since(last_update).num_seconds();
        let ttl_secs = i64::try_from(metadata.is_active_ttl_secs).unwrap_or(i64::MAX);
        let active = idle_secs < ttl_secs;

        info!(
            deployment = %id,
            active,
            idle_secs,
            ttl_secs,
            cached,
            "isActive"
        );
        Ok(active)
    }

    /// The configured metric name and target.
    pub fn metric_spec(&self, metadata: &ScalerMetadata) -> MetricTarget {
        let target = MetricTarget {
            metric_name: metadata.scale_metric_name.clone(),
            target_value: metadata.target_value,
        };
        info!(
            deployment = %metadata.deployment_id,
            metric = %target.metric_name,
            target = target.target_value,
            "metric spec"
        );
        target
    }

    /// Current rate of the workload's counter over the retention window.
    ///
    /// Reports 0 while no baseline exists. Fails if `requested_metric` is
    /// not the configured metric, or the counter went backwards.
    pub async fn metrics(
        &self,
        metadata: &ScalerMetadata,
        requested_metric: &str,
    ) -> ScalerResult<i64> {
        if requested_metric != metadata.scale_metric_name {
            return Err(ScalerError::InvalidArgument(format!(
                "{KEY_SCALE_METRIC_NAME} changed [{} => {requested_metric}]",
                metadata.scale_metric_name
            )));
        }

        let current = self.current_value(metadata).await?;
        let now = Utc::now();
        let id = metadata.deployment_id.as_str();

        let oldest = match self.store.record_at(id, current, metadata.scale_period_secs, now) {
            Ok(sample) => sample,
            Err(CacheError::NotFound(_)) => {
                info!(deployment = %id, current, "no baseline sample yet, reporting 0");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let divisor = if metadata.normalize_by_pods {
            let pods = self
                .pods
                .count_pods(&metadata.namespace, &metadata.deployment_names)
                .await?;
            debug!(deployment = %id, pods, namespace = %metadata.namespace, "normalizing by pod count");
            Some(pods)
        } else {
            None
        };

        let value = compute_rate(&oldest, &MetricSample::new(current, now), divisor)?;

        info!(
            deployment = %id,
            metric = %requested_metric,
            oldest = oldest.value,
            current,
            ?divisor,
            value,
            "metrics"
        );
        Ok(value)
    }

    async fn current_value(&self, metadata: &ScalerMetadata) -> ScalerResult<i64> {
        let key = self
            .keys
            .metric_key(&metadata.deployment_id, &metadata.scale_metric_name);
        let raw = self.required(&key).await?;
        raw.trim().parse().map_err(|e| {
            ScalerError::Internal(format!("invalid metric value '{raw}' for '{key}': {e}"))
        })
    }

    async fn last_update(&self, metadata: &ScalerMetadata) -> ScalerResult<DateTime<Utc>> {
        let key = self.keys.last_update_key(&metadata.deployment_id);
        let raw = self.required(&key).await?;
        parse_timestamp(&raw).ok_or_else(|| {
            ScalerError::Internal(format!("invalid last update time '{raw}' for '{key}'"))
        })
    }

    async fn required(&self, key: &str) -> ScalerResult<String> {
        self.source
            .get(key)
            .await?
            .ok_or_else(|| ScalerError::Internal(format!("key '{key}' not found")))
    }
}
