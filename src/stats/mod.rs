//! # Submission Statistics
//!
//! Running count of accepted submissions and the total time spent handling
//! them. The average is derived on read.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Point-in-time view of the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Number of recorded submissions
    pub total: u64,
    /// Mean handling time in whole microseconds, truncated
    pub average: u64,
}

#[derive(Debug, Default)]
struct Totals {
    submissions: u64,
    elapsed: Duration,
}

/// Thread-safe accumulator of submission timings
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    totals: Mutex<Totals>,
}

impl StatsAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one submission that took `elapsed` to handle
    pub fn record(&self, elapsed: Duration) {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        totals.submissions += 1;
        totals.elapsed = totals.elapsed.saturating_add(elapsed);
    }

    /// Current totals, or `None` before the first submission
    #[must_use]
    pub fn snapshot(&self) -> Option<StatsSnapshot> {
        let (submissions, elapsed) = {
            let totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
            (totals.submissions, totals.elapsed)
        };

        if submissions == 0 {
            return None;
        }

        let average = elapsed.as_micros() / u128::from(submissions);
        Some(StatsSnapshot {
            total: submissions,
            average: u64::try_from(average).unwrap_or(u64::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_snapshot() {
        let stats = StatsAccumulator::new();
        assert_eq!(stats.snapshot(), None);
    }

    #[test]
    fn test_average_is_truncated_micros() {
        let stats = StatsAccumulator::new();
        stats.record(Duration::from_micros(100));
        stats.record(Duration::from_micros(201));
        stats.record(Duration::from_nanos(1_500));

        // (100 + 201 + 1.5) / 3 = 100.83
        assert_eq!(
            stats.snapshot(),
            Some(StatsSnapshot {
                total: 3,
                average: 100
            })
        );
    }

    #[test]
    fn test_zero_elapsed_still_counts() {
        let stats = StatsAccumulator::new();
        stats.record(Duration::ZERO);

        assert_eq!(
            stats.snapshot(),
            Some(StatsSnapshot {
                total: 1,
                average: 0
            })
        );
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let stats = Arc::new(StatsAccumulator::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        stats.record(Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot().unwrap();
        assert_eq!(snapshot.total, 8_000);
        assert_eq!(snapshot.average, 10);
    }

    #[test]
    fn test_snapshot_serializes_as_total_and_average() {
        let json = serde_json::to_string(&StatsSnapshot {
            total: 2,
            average: 1_234,
        })
        .unwrap();
        assert_eq!(json, r#"{"total":2,"average":1234}"#);
    }
}
