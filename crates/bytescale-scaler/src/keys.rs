//! Key-value layout: where a workload's counter and last-update live.
//!
//! Key prefixes are templates containing the literal `deploymentid`,
//! replaced (first occurrence only) by the workload id:
//!
//! ```text
//! metrics template  "deploymentid:minio-metrics" → "w1:minio-metrics:bytes_out"
//! last update       "deploymentid:last_action"   → "w1:last_action"
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};

/// Placeholder substituted with the workload id.
pub const DEPLOYMENT_ID_PLACEHOLDER: &str = "deploymentid";

pub const DEFAULT_LAST_UPDATE_PREFIX_TEMPLATE: &str = "deploymentid:last_action";
pub const DEFAULT_METRICS_PREFIX_TEMPLATE: &str = "deploymentid:minio-metrics";

/// Process-wide key templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplates {
    pub last_update_prefix: String,
    pub metrics_prefix: String,
}

impl Default for KeyTemplates {
    fn default() -> Self {
        Self {
            last_update_prefix: DEFAULT_LAST_UPDATE_PREFIX_TEMPLATE.to_string(),
            metrics_prefix: DEFAULT_METRICS_PREFIX_TEMPLATE.to_string(),
        }
    }
}

impl KeyTemplates {
    /// Key holding the workload's last-update timestamp.
    pub fn last_update_key(&self, deployment_id: &str) -> String {
        substitute(&self.last_update_prefix, deployment_id)
    }

    /// Key holding the workload's cumulative counter for `metric_name`.
    pub fn metric_key(&self, deployment_id: &str, metric_name: &str) -> String {
        format!("{}:{metric_name}", substitute(&self.metrics_prefix, deployment_id))
    }
}

fn substitute(template: &str, deployment_id: &str) -> String {
    template.replacen(DEPLOYMENT_ID_PLACEHOLDER, deployment_id, 1)
}

/// Parse a stored last-update timestamp.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (or space
/// separated) timestamp taken as UTC, or integer Unix seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_keys() {
        let keys = KeyTemplates::default();
        assert_eq!(keys.last_update_key("w1"), "w1:last_action");
        assert_eq!(keys.metric_key("w1", "bytes_out"), "w1:minio-metrics:bytes_out");
    }

    #[test]
    fn only_first_placeholder_is_replaced() {
        let keys = KeyTemplates {
            last_update_prefix: "deploymentid/deploymentid".to_string(),
            metrics_prefix: "metrics".to_string(),
        };
        assert_eq!(keys.last_update_key("w1"), "w1/deploymentid");
        // Templates without a placeholder are used as-is.
        assert_eq!(keys.metric_key("w1", "bytes_in"), "metrics:bytes_in");
    }

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();

        assert_eq!(parse_timestamp("2024-03-01T12:30:45Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:30:45+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:45"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-03-01 12:30:45 "), Some(expected));
        assert_eq!(parse_timestamp(&expected.timestamp().to_string()), Some(expected));

        let fractional = parse_timestamp("2024-03-01T12:30:45.250").unwrap();
        assert_eq!(fractional.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01T00:00:00"), None);
    }
}
