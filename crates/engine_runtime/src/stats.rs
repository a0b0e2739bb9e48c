//! Per-operation execution statistics.
//!
//! Operations in one stage run on different worker threads and record their
//! timings concurrently, so the table is a [`DashMap`].

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Accumulated timings for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    /// Number of times the transform ran.
    pub runs: u64,
    /// Number of runs that returned an error.
    pub failures: u64,
    /// Total time spent in the transform.
    pub total: Duration,
    /// Time spent in the most recent run.
    pub last: Duration,
}

/// Execution statistics keyed by operation id.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    operations: DashMap<String, OperationStats>,
}

impl ExecutionStats {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one run of an operation.
    pub fn record(&self, operation: &str, elapsed: Duration, ok: bool) {
        let mut entry = self.operations.entry(operation.to_string()).or_default();
        entry.runs += 1;
        entry.total += elapsed;
        entry.last = elapsed;
        if !ok {
            entry.failures += 1;
        }
    }

    /// Returns a snapshot of one operation's statistics.
    #[must_use]
    pub fn get(&self, operation: &str) -> Option<OperationStats> {
        self.operations.get(operation).map(|entry| *entry)
    }

    /// Drop an operation's statistics.
    pub fn forget(&self, operation: &str) {
        self.operations.remove(operation);
    }

    /// Returns the number of operations with statistics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns a snapshot of every operation's statistics, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, OperationStats)> {
        let mut all: Vec<_> = self
            .operations
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let stats = ExecutionStats::new();
        stats.record("move", Duration::from_millis(2), true);
        stats.record("move", Duration::from_millis(3), false);

        let moved = stats.get("move").unwrap();
        assert_eq!(moved.runs, 2);
        assert_eq!(moved.failures, 1);
        assert_eq!(moved.total, Duration::from_millis(5));
        assert_eq!(moved.last, Duration::from_millis(3));
        assert!(stats.get("regen").is_none());
    }

    #[test]
    fn test_concurrent_records() {
        let stats = ExecutionStats::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        stats.record("regen", Duration::from_micros(1), true);
                    }
                });
            }
        });
        assert_eq!(stats.get("regen").map(|s| s.runs), Some(400));
    }

    #[test]
    fn test_snapshot_sorted_and_forget() {
        let stats = ExecutionStats::new();
        stats.record("b", Duration::ZERO, true);
        stats.record("a", Duration::ZERO, true);
        let ids: Vec<_> = stats.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        stats.forget("a");
        assert_eq!(stats.len(), 1);
    }
}
