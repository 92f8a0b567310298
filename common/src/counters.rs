use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic run counters. Written by the result sink only; everyone else
/// reads [`CounterSnapshot`]s.
#[derive(Debug, Default)]
pub struct RunCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, reachable: bool) {
        if reachable {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `attempted` is derived, so every snapshot satisfies
    /// `attempted == succeeded + failed`.
    pub fn snapshot(&self) -> CounterSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        CounterSnapshot {
            attempted: succeeded + failed,
            succeeded,
            failed,
        }
    }
}

impl CounterSnapshot {
    /// Share of finished probes that were reachable, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        let finished = self.succeeded + self.failed;
        if finished == 0 {
            return 0.0;
        }
        self.succeeded as f64 / finished as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_updates_all_counters() {
        let counters = RunCounters::new();
        counters.record(true);
        counters.record(false);
        counters.record(false);

        let snap = counters.snapshot();
        assert_eq!(snap, CounterSnapshot { attempted: 3, succeeded: 1, failed: 2 });
        assert!((snap.success_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshots_stay_consistent_under_concurrent_writes() {
        let counters = std::sync::Arc::new(RunCounters::new());
        let writer = {
            let counters = std::sync::Arc::clone(&counters);
            std::thread::spawn(move || {
                for n in 0..50_000u32 {
                    counters.record(n % 3 == 0);
                }
            })
        };

        while !writer.is_finished() {
            let snap = counters.snapshot();
            assert_eq!(snap.attempted, snap.succeeded + snap.failed);
        }
        writer.join().unwrap();
        assert_eq!(counters.snapshot().attempted, 50_000);
    }

    #[test]
    fn empty_rate_is_zero() {
        assert_eq!(CounterSnapshot::default().success_rate(), 0.0);
    }
}
