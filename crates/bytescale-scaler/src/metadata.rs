//! Typed scaler metadata.
//!
//! KEDA passes the ScaledObject trigger metadata as a string map. It is
//! parsed once per request into [`ScalerMetadata`]; missing keys take the
//! defaults below and every value is trimmed.
//!
//! | key                  | default       |
//! |----------------------|---------------|
//! | `deploymentid`       | `deploymentid`|
//! | `isActiveTtlSeconds` | `600`         |
//! | `scaleMetricName`    | `bytes_out`   |
//! | `scalePeriodSeconds` | `600`         |
//! | `targetValue`        | `10`          |
//! | `namespaceName`      | `default`     |
//! | `deploymentNames`    | (empty)       |

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ScalerError, ScalerResult};

pub const KEY_DEPLOYMENT_ID: &str = "deploymentid";
pub const KEY_IS_ACTIVE_TTL_SECONDS: &str = "isActiveTtlSeconds";
pub const KEY_SCALE_METRIC_NAME: &str = "scaleMetricName";
pub const KEY_SCALE_PERIOD_SECONDS: &str = "scalePeriodSeconds";
pub const KEY_TARGET_VALUE: &str = "targetValue";
pub const KEY_NAMESPACE_NAME: &str = "namespaceName";
pub const KEY_DEPLOYMENT_NAMES: &str = "deploymentNames";

pub const DEFAULT_DEPLOYMENT_ID: &str = "deploymentid";
pub const DEFAULT_IS_ACTIVE_TTL_SECONDS: u64 = 600;
pub const DEFAULT_SCALE_METRIC_NAME: &str = "bytes_out";
pub const DEFAULT_SCALE_PERIOD_SECONDS: u64 = 600;
pub const DEFAULT_TARGET_VALUE: i64 = 10;
pub const DEFAULT_NAMESPACE_NAME: &str = "default";

/// Validated per-workload scaler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalerMetadata {
    /// Workload identity; keys the sample history.
    pub deployment_id: String,
    /// Maximum age of the last update for the workload to count as active.
    pub is_active_ttl_secs: u64,
    pub scale_metric_name: String,
    /// Retention window of the sample history.
    pub scale_period_secs: u64,
    pub target_value: i64,
    pub namespace: String,
    /// Pod name prefixes; empty selects every pod in the namespace.
    pub deployment_names: Vec<String>,
    /// Divide the rate by the running pod count. Enabled when
    /// `namespaceName` is given explicitly.
    pub normalize_by_pods: bool,
}

impl Default for ScalerMetadata {
    fn default() -> Self {
        Self {
            deployment_id: DEFAULT_DEPLOYMENT_ID.to_string(),
            is_active_ttl_secs: DEFAULT_IS_ACTIVE_TTL_SECONDS,
            scale_metric_name: DEFAULT_SCALE_METRIC_NAME.to_string(),
            scale_period_secs: DEFAULT_SCALE_PERIOD_SECONDS,
            target_value: DEFAULT_TARGET_VALUE,
            namespace: DEFAULT_NAMESPACE_NAME.to_string(),
            deployment_names: Vec::new(),
            normalize_by_pods: false,
        }
    }
}

impl ScalerMetadata {
    /// Parse and validate the raw metadata map.
    pub fn parse(raw: &HashMap<String, String>) -> ScalerResult<Self> {
        let defaults = Self::default();
        let get = |key: &str| raw.get(key).map(|v| v.trim());

        let metadata = Self {
            deployment_id: non_empty(KEY_DEPLOYMENT_ID, get(KEY_DEPLOYMENT_ID))?
                .unwrap_or(defaults.deployment_id),
            is_active_ttl_secs: non_negative(KEY_IS_ACTIVE_TTL_SECONDS, get(KEY_IS_ACTIVE_TTL_SECONDS))?
                .map_or(defaults.is_active_ttl_secs, i64::unsigned_abs),
            scale_metric_name: non_empty(KEY_SCALE_METRIC_NAME, get(KEY_SCALE_METRIC_NAME))?
                .unwrap_or(defaults.scale_metric_name),
            scale_period_secs: non_negative(KEY_SCALE_PERIOD_SECONDS, get(KEY_SCALE_PERIOD_SECONDS))?
                .map_or(defaults.scale_period_secs, i64::unsigned_abs),
            target_value: non_negative(KEY_TARGET_VALUE, get(KEY_TARGET_VALUE))?
                .unwrap_or(defaults.target_value),
            namespace: non_empty(KEY_NAMESPACE_NAME, get(KEY_NAMESPACE_NAME))?
                .unwrap_or(defaults.namespace),
            deployment_names: get(KEY_DEPLOYMENT_NAMES)
                .map(split_names)
                .unwrap_or_default(),
            normalize_by_pods: raw.contains_key(KEY_NAMESPACE_NAME),
        };

        debug!(?metadata, "parsed scaler metadata");
        Ok(metadata)
    }
}

fn non_empty(key: &str, value: Option<&str>) -> ScalerResult<Option<String>> {
    match value {
        Some("") => Err(ScalerError::InvalidArgument(format!(
            "empty metadata value for {key}"
        ))),
        other => Ok(other.map(str::to_string)),
    }
}

fn non_negative(key: &str, value: Option<&str>) -> ScalerResult<Option<i64>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let parsed: i64 = value.parse().map_err(|e| {
        ScalerError::InvalidArgument(format!(
            "could not get metadata value for {key}. {e}"
        ))
    })?;

    if parsed < 0 {
        return Err(ScalerError::InvalidArgument(format!(
            "invalid value: {key} => {parsed}"
        )));
    }
    Ok(Some(parsed))
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
