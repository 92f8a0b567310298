//! One worker's run over one job: expand, probe, persist, report.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reachr_common::network::cidr;
use reachr_common::{CidrBlock, ConfigError, CounterSnapshot, ProbeTarget, Prober, SinkError};
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::{EngineSettings, ProbeEngine, RunControl};
use crate::progress::{self, ProgressReport, ProgressReporter};
use crate::sink::{OutputPaths, ResultSink, SinkOptions, WriteMode, recorded_addresses};

/// Addresses kept per class for the final summary.
pub const SAMPLE_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// The blocks one worker probes, with an optional address cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeJob {
    blocks: Vec<CidrBlock>,
    limit: Option<u64>,
}

impl ProbeJob {
    pub fn new(blocks: Vec<CidrBlock>) -> Self {
        Self { blocks, limit: None }
    }

    /// Probe only the first `limit` addresses, in block order.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn blocks(&self) -> &[CidrBlock] {
        &self.blocks
    }

    /// Number of addresses the job covers after the cap.
    pub fn planned(&self) -> u64 {
        let total = cidr::total_size(&self.blocks);
        self.limit.map_or(total, |limit| total.min(limit))
    }

    pub fn targets(&self) -> impl Iterator<Item = ProbeTarget> + Clone + Send + use<> {
        let cap = self.limit.map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        self.blocks
            .clone()
            .into_iter()
            .flat_map(|block| block.hosts())
            .take(cap)
            .map(ProbeTarget::from)
    }
}

/// Fixed-size uniform sample of a stream of unknown length.
#[derive(Debug, Clone)]
pub struct Reservoir<T> {
    capacity: usize,
    seen: u64,
    items: Vec<T>,
}

impl<T> Reservoir<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn offer(&mut self, item: T) {
        self.seen += 1;
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }
        let slot = rand::random_range(0..self.seen);
        if slot < self.capacity as u64 {
            self.items[slot as usize] = item;
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn into_sorted(mut self) -> Vec<T>
    where
        T: Ord,
    {
        self.items.sort();
        self.items
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub engine: EngineSettings,
    pub outputs: OutputPaths,
    pub sink: SinkOptions,
    pub progress_interval: Duration,
    /// Stop admitting new targets after this long.
    pub deadline: Option<Duration>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            outputs: OutputPaths::in_dir("."),
            sink: SinkOptions::default(),
            progress_interval: progress::DEFAULT_INTERVAL,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub counters: CounterSnapshot,
    /// Addresses this run set out to probe, after the cap and resume skips.
    pub total: u64,
    /// Addresses skipped because an earlier run already recorded them.
    pub skipped: u64,
    pub elapsed: Duration,
    pub aborted: bool,
    pub deadline_reached: bool,
    pub reachable_sample: Vec<IpAddr>,
    pub unreachable_sample: Vec<IpAddr>,
}

impl RunSummary {
    pub fn success_rate(&self) -> f64 {
        self.counters.success_rate()
    }

    pub fn is_complete(&self) -> bool {
        self.counters.attempted >= self.total
    }
}

pub struct JobRunner {
    prober: Arc<dyn Prober>,
    options: RunnerOptions,
}

impl JobRunner {
    pub fn new(prober: Arc<dyn Prober>, options: RunnerOptions) -> Result<Self, ConfigError> {
        options.engine.validate()?;
        Ok(Self { prober, options })
    }

    pub async fn run<F>(&self, job: &ProbeJob, control: &RunControl, on_progress: F) -> Result<RunSummary, RunError>
    where
        F: FnMut(&ProgressReport) + Send + 'static,
    {
        let started = Instant::now();
        let outputs = &self.options.outputs;
        let engine = ProbeEngine::new(Arc::clone(&self.prober), self.options.engine.clone())?;

        // Opening in append mode repairs torn tails, so this must come first.
        let mut sink = ResultSink::open(outputs, self.options.sink).await?;

        let recorded: HashSet<IpAddr> = match self.options.sink.mode {
            WriteMode::Append => recorded_addresses(outputs).await?,
            WriteMode::Truncate => HashSet::new(),
        };
        let skipped = if recorded.is_empty() {
            0
        } else {
            job.targets().filter(|t| recorded.contains(&t.addr)).count() as u64
        };
        let total = job.planned() - skipped;
        if skipped > 0 {
            info!("Resuming: {skipped} address(es) already recorded, {total} left");
        }

        let progress = ProgressReporter::new(sink.counters(), total, self.options.progress_interval).spawn(on_progress);

        let deadline_hit = CancellationToken::new();
        let deadline = self.options.deadline.map(|after| {
            let control = control.clone();
            let hit = deadline_hit.clone();
            tokio::spawn(async move {
                time::sleep(after).await;
                if control.is_admitting() {
                    info!("Deadline reached after {after:?}; letting in-flight probes finish");
                    hit.cancel();
                    control.stop_admission();
                }
            })
        });

        let mut reachable_sample = Reservoir::new(SAMPLE_SIZE);
        let mut unreachable_sample = Reservoir::new(SAMPLE_SIZE);

        let targets = job.targets().filter(move |t| !recorded.contains(&t.addr));
        let results = engine.run(targets, control).inspect(|result| {
            if result.reachable {
                reachable_sample.offer(result.target.addr);
            } else {
                unreachable_sample.offer(result.target.addr);
            }
        });
        let outcome = sink.consume(results).await;

        if let Some(task) = deadline {
            task.abort();
        }
        progress.finish().await;

        let counters = outcome?;
        sink.close().await?;

        Ok(RunSummary {
            counters,
            total,
            skipped,
            elapsed: started.elapsed(),
            aborted: control.is_aborted(),
            deadline_reached: deadline_hit.is_cancelled(),
            reachable_sample: reachable_sample.into_sorted(),
            unreachable_sample: unreachable_sample.into_sorted(),
        })
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
