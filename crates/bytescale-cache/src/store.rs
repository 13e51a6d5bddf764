//! SampleStore — per-workload, time-windowed counter history.
//!
//! Each workload owns a `VecDeque<MetricSample>` in insertion order, which
//! is also time order: a sample stamped earlier than the newest one (clock
//! step, or a request that read the clock before a concurrent one took
//! the lock) is re-stamped to the newest timestamp. Purging is therefore
//! always a contiguous prefix trim.
//!
//! # Concurrency model
//!
//! A single `std::sync::Mutex` guards the whole keyed map. Every operation
//! is bounded by the window size and never awaits, so request handlers
//! take the lock for a short synchronous section. [`SampleStore::observe`]
//! runs the append and purge of one request under a single acquisition;
//! [`SampleStore::record`] also reads the baseline.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::sample::MetricSample;

type Histories = HashMap<String, VecDeque<MetricSample>>;

/// Thread-safe store of metric histories keyed by workload id.
///
/// Share it across request handlers with an `Arc`.
#[derive(Debug, Default)]
pub struct SampleStore {
    histories: Mutex<Histories>,
}

impl SampleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` for `workload_id`, stamped with the current time.
    ///
    /// Returns `false` when the value was skipped because it is not
    /// strictly greater than the last appended value.
    pub fn append(&self, workload_id: &str, value: i64) -> bool {
        self.append_at(workload_id, value, Utc::now())
    }

    /// Append `value` for `workload_id`, stamped with `now` (or the newest
    /// retained timestamp, if that is later).
    pub fn append_at(&self, workload_id: &str, value: i64, now: DateTime<Utc>) -> bool {
        append_locked(&mut self.lock(), workload_id, value, now)
    }

    /// Drop every sample older than `retention_window_secs`.
    ///
    /// Returns the number of samples removed. A workload whose history
    /// becomes empty is removed from the store.
    pub fn purge(&self, workload_id: &str, retention_window_secs: u64) -> usize {
        self.purge_at(workload_id, retention_window_secs, Utc::now())
    }

    /// Same as [`purge`](Self::purge) with an explicit "now".
    pub fn purge_at(
        &self,
        workload_id: &str,
        retention_window_secs: u64,
        now: DateTime<Utc>,
    ) -> usize {
        purge_locked(&mut self.lock(), workload_id, retention_window_secs, now)
    }

    /// The earliest retained sample for `workload_id`.
    pub fn oldest(&self, workload_id: &str) -> CacheResult<MetricSample> {
        oldest_locked(&self.lock(), workload_id)
    }

    /// Append and purge for one request, atomically.
    ///
    /// Returns the number of samples retained afterwards.
    pub fn observe(&self, workload_id: &str, value: i64, retention_window_secs: u64) -> usize {
        self.observe_at(workload_id, value, retention_window_secs, Utc::now())
    }

    /// Same as [`observe`](Self::observe) with an explicit "now".
    pub fn observe_at(
        &self,
        workload_id: &str,
        value: i64,
        retention_window_secs: u64,
        now: DateTime<Utc>,
    ) -> usize {
        let mut histories = self.lock();
        append_locked(&mut histories, workload_id, value, now);
        purge_locked(&mut histories, workload_id, retention_window_secs, now);
        histories.get(workload_id).map_or(0, VecDeque::len)
    }

    /// Append, purge and read the baseline for one request, atomically.
    ///
    /// Returns the oldest sample surviving the purge. `NotFound` is only
    /// possible when the append was skipped and the purge then emptied
    /// the history.
    pub fn record(
        &self,
        workload_id: &str,
        value: i64,
        retention_window_secs: u64,
    ) -> CacheResult<MetricSample> {
        self.record_at(workload_id, value, retention_window_secs, Utc::now())
    }

    /// Same as [`record`](Self::record) with an explicit "now".
    pub fn record_at(
        &self,
        workload_id: &str,
        value: i64,
        retention_window_secs: u64,
        now: DateTime<Utc>,
    ) -> CacheResult<MetricSample> {
        let mut histories = self.lock();
        append_locked(&mut histories, workload_id, value, now);
        purge_locked(&mut histories, workload_id, retention_window_secs, now);
        oldest_locked(&histories, workload_id)
    }

    /// Number of samples held for `workload_id` (0 if absent).
    pub fn size(&self, workload_id: &str) -> usize {
        self.lock().get(workload_id).map_or(0, VecDeque::len)
    }

    /// Whether `workload_id` has no retained samples.
    pub fn is_empty(&self, workload_id: &str) -> bool {
        self.size(workload_id) == 0
    }

    /// Number of workloads that currently have history. Used for
    /// diagnostics by embedders; the scaler itself only reads per-workload
    /// state.
    pub fn workloads(&self) -> usize {
        self.lock().len()
    }

    /// The map is consistent between statements, so a panic in another
    /// holder leaves nothing half-written.
    fn lock(&self) -> MutexGuard<'_, Histories> {
        self.histories.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn append_locked(
    histories: &mut Histories,
    workload_id: &str,
    value: i64,
    now: DateTime<Utc>,
) -> bool {
    match histories.get_mut(workload_id) {
        Some(history) => {
            let mut timestamp = now;
            if let Some(last) = history.back() {
                if value <= last.value {
                    debug!(
                        workload = %workload_id,
                        value,
                        last = last.value,
                        "sample not greater than last value, skipped"
                    );
                    return false;
                }
                if now < last.timestamp {
                    debug!(
                        workload = %workload_id,
                        %now,
                        newest = %last.timestamp,
                        "sample older than newest, re-stamped"
                    );
                    timestamp = last.timestamp;
                }
            }
            history.push_back(MetricSample::new(value, timestamp));
        }
        None => {
            histories.insert(
                workload_id.to_string(),
                VecDeque::from([MetricSample::new(value, now)]),
            );
        }
    }

    debug!(workload = %workload_id, value, "sample appended");
    true
}

fn purge_locked(
    histories: &mut Histories,
    workload_id: &str,
    retention_window_secs: u64,
    now: DateTime<Utc>,
) -> usize {
    let Some(history) = histories.get_mut(workload_id) else {
        debug!(workload = %workload_id, "nothing to purge, no history");
        return 0;
    };

    let window = i64::try_from(retention_window_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);

    // Time-ordered, so the expired samples form a prefix.
    let cut = history.partition_point(|sample| sample.is_expired(window, now));
    if cut > 0 {
        let old_size = history.len();
        history.drain(..cut);
        debug!(
            workload = %workload_id,
            purged = cut,
            old_size,
            new_size = history.len(),
            retention_window_secs,
            "purged expired samples"
        );
    }

    if history.is_empty() {
        histories.remove(workload_id);
        debug!(workload = %workload_id, "history empty, workload evicted");
    }

    cut
}

fn oldest_locked(histories: &Histories, workload_id: &str) -> CacheResult<MetricSample> {
    histories
        .get(workload_id)
        .and_then(|history| history.front().copied())
        .ok_or_else(|| CacheError::NotFound(workload_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs)
    }

    fn values(store: &SampleStore, id: &str) -> Vec<i64> {
        store
            .lock()
            .get(id)
            .map(|h| h.iter().map(|s| s.value).collect())
            .unwrap_or_default()
    }

    #[test]
    fn append_creates_history_lazily() {
        let store = SampleStore::new();
        assert_eq!(store.workloads(), 0);
        assert!(store.is_empty("w1"));

        assert!(store.append_at("w1", 100, at(0)));
        assert_eq!(store.workloads(), 1);
        assert_eq!(store.size("w1"), 1);
    }

    #[test]
    fn append_skips_non_increasing_values() {
        let store = SampleStore::new();
        assert!(store.append_at("w1", 100, at(0)));

        // Equal and smaller values leave the history untouched.
        assert!(!store.append_at("w1", 100, at(1)));
        assert!(!store.append_at("w1", 50, at(2)));
        assert_eq!(values(&store, "w1"), vec![100]);

        assert!(store.append_at("w1", 101, at(3)));
        assert_eq!(values(&store, "w1"), vec![100, 101]);
    }

    #[test]
    fn append_guard_is_per_workload() {
        let store = SampleStore::new();
        store.append_at("w1", 500, at(0));
        assert!(store.append_at("w2", 10, at(0)));
        assert_eq!(store.size("w2"), 1);
    }

    #[test]
    fn purge_removes_only_samples_older_than_window() {
        let store = SampleStore::new();
        let now = at(700);
        store.append_at("w1", 1, now - TimeDelta::seconds(700));
        store.append_at("w1", 2, now - TimeDelta::seconds(100));
        store.append_at("w1", 3, now);

        assert_eq!(store.purge_at("w1", 600, now), 1);
        assert_eq!(values(&store, "w1"), vec![2, 3]);
    }

    #[test]
    fn purge_keeps_sample_exactly_at_boundary() {
        let store = SampleStore::new();
        store.append_at("w1", 1, at(0));

        assert_eq!(store.purge_at("w1", 600, at(600)), 0);
        assert_eq!(store.size("w1"), 1);

        assert_eq!(store.purge_at("w1", 600, at(601)), 1);
        assert_eq!(store.size("w1"), 0);
    }

    #[test]
    fn purge_is_idempotent() {
        let store = SampleStore::new();
        store.append_at("w1", 1, at(0));
        store.append_at("w1", 2, at(500));
        store.append_at("w1", 3, at(650));

        assert_eq!(store.purge_at("w1", 600, at(700)), 1);
        let after_first = values(&store, "w1");
        assert_eq!(store.purge_at("w1", 600, at(700)), 0);
        assert_eq!(values(&store, "w1"), after_first);
    }

    #[test]
    fn purge_of_unknown_workload_is_noop() {
        let store = SampleStore::new();
        assert_eq!(store.purge_at("ghost", 600, at(0)), 0);
        assert_eq!(store.workloads(), 0);
    }

    #[test]
    fn fully_expired_workload_is_evicted_and_recreated() {
        let store = SampleStore::new();
        store.append_at("w1", 100, at(0));
        store.append_at("w1", 200, at(5));

        assert_eq!(store.purge_at("w1", 60, at(1000)), 2);
        assert_eq!(store.workloads(), 0);
        assert_eq!(
            store.oldest("w1"),
            Err(CacheError::NotFound("w1".to_string()))
        );

        // A fresh history starts over: the old high-water mark is gone.
        assert!(store.append_at("w1", 5, at(1001)));
        assert_eq!(store.oldest("w1").unwrap().value, 5);
    }

    #[test]
    fn oldest_of_unknown_workload_is_not_found() {
        let store = SampleStore::new();
        assert!(matches!(store.oldest("w1"), Err(CacheError::NotFound(id)) if id == "w1"));
    }

    #[test]
    fn zero_window_keeps_only_current_instant() {
        let store = SampleStore::new();
        store.append_at("w1", 1, at(0));
        store.append_at("w1", 2, at(10));

        store.purge_at("w1", 0, at(10));
        assert_eq!(values(&store, "w1"), vec![2]);
    }

    #[test]
    fn huge_window_never_expires() {
        let store = SampleStore::new();
        store.append_at("w1", 1, at(0));
        assert_eq!(store.purge_at("w1", u64::MAX, at(1_000_000)), 0);
        assert_eq!(store.size("w1"), 1);
    }

    #[test]
    fn windowed_history_end_to_end() {
        let store = SampleStore::new();

        store.append_at("w1", 100, at(0));

        store.append_at("w1", 150, at(10));
        store.purge_at("w1", 600, at(10));
        assert_eq!(values(&store, "w1"), vec![100, 150]);

        // At t=700 both earlier samples are more than 600s old.
        store.append_at("w1", 400, at(700));
        store.purge_at("w1", 600, at(700));
        assert_eq!(values(&store, "w1"), vec![400]);

        let oldest = store.oldest("w1").unwrap();
        assert_eq!(oldest, MetricSample::new(400, at(700)));

        let current = MetricSample::new(450, at(710));
        assert_eq!(crate::compute_rate(&oldest, &current, None), Ok(50));
    }

    #[test]
    fn record_appends_purges_and_returns_baseline() {
        let store = SampleStore::new();

        assert_eq!(store.record_at("w1", 100, 600, at(0)).unwrap().value, 100);
        assert_eq!(store.record_at("w1", 150, 600, at(10)).unwrap().value, 100);
        assert_eq!(store.record_at("w1", 400, 600, at(700)).unwrap().value, 400);
        assert_eq!(store.size("w1"), 1);
    }

    #[test]
    fn record_reports_not_found_after_regression_ages_out() {
        let store = SampleStore::new();
        store.record_at("w1", 1000, 60, at(0)).unwrap();

        // Counter reset: 5 is skipped and the old sample expires.
        let result = store.record_at("w1", 5, 60, at(120));
        assert_eq!(result, Err(CacheError::NotFound("w1".to_string())));

        // The next request starts a new baseline.
        assert_eq!(store.record_at("w1", 5, 60, at(121)).unwrap().value, 5);
    }

    #[test]
    fn out_of_order_timestamps_keep_history_time_ordered() {
        let store = SampleStore::new();
        let now = at(1000);
        store.append_at("w1", 1, now);
        store.append_at("w1", 2, now - TimeDelta::seconds(100));
        store.append_at("w1", 3, now - TimeDelta::seconds(700));

        let stamps: Vec<_> = store.lock()["w1"].iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![now, now, now]);

        // Nothing is older than the window relative to the newest stamp.
        assert_eq!(store.purge_at("w1", 600, now), 0);
        assert_eq!(values(&store, "w1"), vec![1, 2, 3]);

        // Once the window passes, the whole history expires together.
        assert_eq!(store.purge_at("w1", 600, now + TimeDelta::seconds(601)), 3);
        assert_eq!(store.workloads(), 0);
    }

    #[test]
    fn late_stamp_purges_as_prefix() {
        let store = SampleStore::new();
        store.append_at("w1", 1, at(0));
        store.append_at("w1", 2, at(500));
        // Clock stepped back 400s: stamped at 500, not 100.
        store.append_at("w1", 3, at(100));
        store.append_at("w1", 4, at(900));

        assert_eq!(store.purge_at("w1", 600, at(1000)), 1);
        assert_eq!(values(&store, "w1"), vec![2, 3, 4]);
    }

    #[test]
    fn observe_appends_and_purges_together() {
        let store = SampleStore::new();
        assert_eq!(store.observe_at("w1", 100, 600, at(0)), 1);
        assert_eq!(store.observe_at("w1", 150, 600, at(10)), 2);

        // Both earlier samples expire in the same call that adds 400.
        assert_eq!(store.observe_at("w1", 400, 600, at(700)), 1);
        assert_eq!(values(&store, "w1"), vec![400]);

        // A skipped value still purges.
        assert_eq!(store.observe_at("w1", 10, 600, at(1400)), 0);
        assert_eq!(store.workloads(), 0);
    }

    #[test]
    fn concurrent_observers_never_see_half_applied_requests() {
        let store = Arc::new(SampleStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let retained = store.observe("shared", i * 8 + t, 600);
                        assert!(retained >= 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(store.size("shared") >= 1);
    }

    #[test]
    fn concurrent_appends_keep_history_monotonic() {
        let store = Arc::new(SampleStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.append("shared", i * 8 + t);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let v = values(&store, "shared");
        assert!(!v.is_empty());
        assert!(v.windows(2).all(|w| w[0] < w[1]));
    }
}
