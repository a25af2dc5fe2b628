//! Per-run assertion counters

use crate::severity::Outcome;
use crate::summary::StatsSnapshot;
use std::sync::{Mutex, PoisonError};

/// Running totals for one audit run
///
/// All four counters live behind one lock so `total` and the bucket move
/// together and a snapshot never observes a half-applied update.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    counts: Mutex<StatsSnapshot>,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one assertion
    pub fn record_outcome(&self, outcome: Outcome) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.total += 1;
        match outcome {
            Outcome::Passed => counts.passed += 1,
            Outcome::Warning => counts.warning += 1,
            Outcome::Failed => counts.failed += 1,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        let stats = StatsAccumulator::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_record_each_bucket() {
        let stats = StatsAccumulator::new();
        stats.record_outcome(Outcome::Passed);
        stats.record_outcome(Outcome::Passed);
        stats.record_outcome(Outcome::Warning);
        stats.record_outcome(Outcome::Failed);

        let snap = stats.snapshot();
        assert_eq!(
            snap,
            StatsSnapshot {
                total: 4,
                passed: 2,
                warning: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let stats = StatsAccumulator::new();
        stats.record_outcome(Outcome::Passed);
        let before = stats.snapshot();
        stats.record_outcome(Outcome::Failed);

        assert_eq!(before.total, 1);
        assert_eq!(stats.snapshot().total, 2);
    }

    #[test]
    fn test_concurrent_updates_conserve_counts() {
        let stats = Arc::new(StatsAccumulator::new());
        let observer_stats = Arc::clone(&stats);

        let observer = thread::spawn(move || {
            for _ in 0..1000 {
                assert!(observer_stats.snapshot().is_consistent());
            }
        });

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    let outcome = match i % 3 {
                        0 => Outcome::Passed,
                        1 => Outcome::Warning,
                        _ => Outcome::Failed,
                    };
                    for _ in 0..500 {
                        stats.record_outcome(outcome);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        observer.join().unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.total, 4000);
        assert_eq!(snap.passed, 1500);
        assert_eq!(snap.warning, 1500);
        assert_eq!(snap.failed, 1000);
        assert!(snap.is_consistent());
    }
}
