//! Rate computation between a baseline and a current sample.

use crate::error::{CacheError, CacheResult};
use crate::sample::MetricSample;

/// Compute `current - oldest`, optionally divided by `divisor`.
///
/// The counter is expected to be monotonically non-decreasing across the
/// window, so a negative delta (counter reset, metric swap, clock skew)
/// is rejected rather than reported. `divisor` is normally a replica
/// count; the quotient truncates toward zero.
pub fn compute_rate(
    oldest: &MetricSample,
    current: &MetricSample,
    divisor: Option<u64>,
) -> CacheResult<i64> {
    let delta = current.value.checked_sub(oldest.value).ok_or_else(|| {
        CacheError::InvalidArgument(format!(
            "metric delta overflows: {} - {}",
            current.value, oldest.value
        ))
    })?;

    if delta < 0 {
        return Err(CacheError::InvalidArgument(format!(
            "invalid metric value: {delta}, must be positive"
        )));
    }

    match divisor {
        None => Ok(delta),
        Some(0) => Err(CacheError::InvalidArgument(
            "cannot normalize metric by a pod count of 0".to_string(),
        )),
        // A divisor beyond i64::MAX exceeds any non-negative delta.
        Some(n) => Ok(i64::try_from(n).map_or(0, |n| delta / n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(value: i64) -> MetricSample {
        MetricSample::new(value, Utc::now())
    }

    #[test]
    fn plain_delta() {
        assert_eq!(compute_rate(&sample(100), &sample(150), None), Ok(50));
        assert_eq!(compute_rate(&sample(100), &sample(150), Some(1)), Ok(50));
    }

    #[test]
    fn divisor_truncates() {
        assert_eq!(compute_rate(&sample(100), &sample(150), Some(5)), Ok(10));
        assert_eq!(compute_rate(&sample(100), &sample(150), Some(3)), Ok(16));
        assert_eq!(compute_rate(&sample(100), &sample(150), Some(51)), Ok(0));
    }

    #[test]
    fn zero_delta_is_valid() {
        assert_eq!(compute_rate(&sample(7), &sample(7), Some(2)), Ok(0));
    }

    #[test]
    fn negative_delta_is_rejected() {
        let err = compute_rate(&sample(150), &sample(100), Some(1)).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(msg) if msg.contains("-50")));
    }

    #[test]
    fn zero_divisor_is_rejected() {
        assert!(matches!(
            compute_rate(&sample(100), &sample(150), Some(0)),
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(matches!(
            compute_rate(&sample(i64::MIN), &sample(i64::MAX), None),
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_divisor_yields_zero() {
        assert_eq!(compute_rate(&sample(0), &sample(i64::MAX), Some(u64::MAX)), Ok(0));
    }
}
