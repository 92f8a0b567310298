//! Passive progress observer: samples [`RunCounters`] on a fixed cadence.
//!
//! Reading a snapshot is a handful of relaxed atomic loads, so the probe
//! pipeline never waits on the reporter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reachr_common::{CounterSnapshot, RunCounters};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const MIN_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub snapshot: CounterSnapshot,
    pub total: u64,
    pub elapsed: Duration,
    pub success_rate: f64,
    /// Probes finished per second.
    pub throughput: f64,
    pub eta: Option<Duration>,
}

impl ProgressReport {
    pub fn compute(snapshot: CounterSnapshot, total: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 {
            snapshot.attempted as f64 / secs
        } else {
            0.0
        };

        let remaining = total.saturating_sub(snapshot.attempted);
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if throughput > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / throughput))
        } else {
            None
        };

        Self {
            snapshot,
            total,
            elapsed,
            success_rate: snapshot.success_rate(),
            throughput,
            eta,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.snapshot.attempted)
    }
}

pub struct ProgressReporter {
    counters: Arc<RunCounters>,
    total: u64,
    started: Instant,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(counters: Arc<RunCounters>, total: u64, interval: Duration) -> Self {
        Self {
            counters,
            total,
            started: Instant::now(),
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn sample(&self) -> ProgressReport {
        ProgressReport::compute(self.counters.snapshot(), self.total, self.started.elapsed())
    }

    /// Calls `on_tick` once per interval until the handle is finished, then
    /// once more with the final numbers.
    pub fn spawn<F>(self, mut on_tick: F) -> ProgressHandle
    where
        F: FnMut(&ProgressReport) + Send + 'static,
    {
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => on_tick(&self.sample()),
                    _ = stopped.cancelled() => {
                        on_tick(&self.sample());
                        break;
                    }
                }
            }
        });

        ProgressHandle { stop, task }
    }
}

pub struct ProgressHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl ProgressHandle {
    /// Stops the ticker after one final report.
    pub async fn finish(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Progress reporter ended abnormally: {e}");
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
