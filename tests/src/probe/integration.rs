#![cfg(test)]
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reachr_common::{CounterSnapshot, ProbeResult, Prober};
use reachr_core::engine::{EngineSettings, ProbeEngine, RunControl};
use reachr_core::partition::Partitioner;
use reachr_core::runner::{JobRunner, ProbeJob, RunnerOptions};
use reachr_core::sink::{OutputPaths, SinkOptions, WriteMode};
use tempfile::tempdir;

use crate::util::{AbortingProber, CountingProber, ScriptedProber, cidr, ip, lines};

fn options(dir: &Path, mode: WriteMode, concurrency: usize) -> RunnerOptions {
    RunnerOptions {
        engine: EngineSettings {
            concurrency,
            timeout: Duration::from_secs(1),
            proxy: None,
        },
        outputs: OutputPaths::in_dir(dir),
        sink: SinkOptions { mode, sync: false },
        progress_interval: Duration::from_millis(20),
        deadline: None,
    }
}

#[tokio::test]
async fn documentation_scenario_end_to_end() {
    let input = vec![cidr("203.0.113.0/30")];
    let partition = Partitioner::default().partition(&input, 2).unwrap();
    assert_eq!(partition.jobs.len(), 2);

    let dir = tempdir().unwrap();
    let prober = Arc::new(ScriptedProber::new(&[("203.0.113.1", true), ("203.0.113.2", false)]));
    let runner = JobRunner::new(prober, options(dir.path(), WriteMode::Truncate, 4)).unwrap();

    let blocks = partition.jobs.iter().flat_map(|j| j.blocks.clone()).collect();
    let summary = runner
        .run(&ProbeJob::new(blocks), &RunControl::new(), |_| {})
        .await
        .unwrap();

    let paths = OutputPaths::in_dir(dir.path());
    assert_eq!(lines(&paths.reachable), vec!["203.0.113.1"]);
    assert_eq!(lines(&paths.unreachable), vec!["203.0.113.2"]);
    assert_eq!(
        lines(&paths.diagnostics),
        vec!["203.0.113.2: HTTP transport error: connection reset"]
    );
    assert_eq!(summary.counters, CounterSnapshot { attempted: 2, succeeded: 1, failed: 1 });
    assert_eq!(summary.reachable_sample, vec![ip("203.0.113.1")]);
    assert_eq!(summary.unreachable_sample, vec![ip("203.0.113.2")]);
}

#[tokio::test]
async fn classification_is_deterministic_across_runs() {
    let script: Vec<(String, bool)> = (1..=30).map(|n| (format!("198.51.100.{n}"), n % 3 == 0)).collect();
    let entries: Vec<(&str, bool)> = script.iter().map(|(a, up)| (a.as_str(), *up)).collect();
    let prober: Arc<dyn Prober> = Arc::new(ScriptedProber::new(&entries).with_delay(Duration::from_millis(1)));

    let mut runs: Vec<Vec<(String, bool)>> = Vec::new();
    for _ in 0..3 {
        let engine = ProbeEngine::new(Arc::clone(&prober), EngineSettings { concurrency: 7, ..Default::default() }).unwrap();
        let targets = ProbeJob::new(vec![cidr("198.51.100.0/27")]).targets();
        let mut results: Vec<ProbeResult> = engine.run(targets, &RunControl::new()).collect().await;
        results.sort_by_key(|r| r.target);
        runs.push(results.iter().map(|r| (r.target.to_string(), r.reachable)).collect());
    }

    assert_eq!(runs[0].len(), 30);
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
    assert_eq!(runs[0].iter().filter(|(_, up)| *up).count(), 10);
}

#[tokio::test]
async fn runner_respects_the_concurrency_bound() {
    let dir = tempdir().unwrap();
    let prober = Arc::new(CountingProber::new(Duration::from_millis(3)));
    let runner = JobRunner::new(prober.clone(), options(dir.path(), WriteMode::Truncate, 5)).unwrap();

    let summary = runner
        .run(&ProbeJob::new(vec![cidr("10.9.0.0/25")]), &RunControl::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(summary.counters.attempted, 126);
    assert!(prober.peak() <= 5, "peak was {}", prober.peak());
}

#[tokio::test]
async fn interrupted_run_leaves_only_whole_records_and_resumes_cleanly() {
    let dir = tempdir().unwrap();
    let job = ProbeJob::new(vec![cidr("192.0.2.0/26")]);
    let paths = OutputPaths::in_dir(dir.path());

    let control = RunControl::new();
    let prober = Arc::new(AbortingProber::new(20, control.clone()));
    let runner = JobRunner::new(prober, options(dir.path(), WriteMode::Truncate, 1)).unwrap();
    let first = runner.run(&job, &control, |_| {}).await.unwrap();

    assert!(first.aborted);
    assert!(first.counters.attempted < 62);
    let recorded = lines(&paths.reachable);
    assert_eq!(recorded.len() as u64, first.counters.attempted);
    assert!(recorded.iter().all(|l| l.parse::<std::net::IpAddr>().is_ok()));

    // A torn record, as left by a kill in the middle of a write.
    let mut text = std::fs::read_to_string(&paths.reachable).unwrap();
    text.push_str("192.0.2.60");
    std::fs::write(&paths.reachable, text).unwrap();

    let prober = Arc::new(ScriptedProber::new(&[]));
    let runner = JobRunner::new(prober, options(dir.path(), WriteMode::Append, 4)).unwrap();
    let second = runner.run(&job, &RunControl::new(), |_| {}).await.unwrap();

    assert!(!second.aborted);
    assert_eq!(second.skipped, first.counters.attempted);
    assert_eq!(second.counters.attempted, 62 - first.counters.attempted);

    let reachable = lines(&paths.reachable);
    let unreachable = lines(&paths.unreachable);
    let all: HashSet<String> = reachable.iter().chain(&unreachable).cloned().collect();
    assert_eq!(reachable.len() + unreachable.len(), 62, "an address was recorded twice");
    assert_eq!(all.len(), 62);
}

#[tokio::test]
async fn deadline_stops_admission_but_keeps_results() {
    let dir = tempdir().unwrap();
    let prober = Arc::new(ScriptedProber::new(&[]).with_delay(Duration::from_millis(40)));
    let mut opts = options(dir.path(), WriteMode::Truncate, 1);
    opts.deadline = Some(Duration::from_millis(100));
    let runner = JobRunner::new(prober, opts).unwrap();

    let summary = runner
        .run(&ProbeJob::new(vec![cidr("10.0.0.0/27")]), &RunControl::new(), |_| {})
        .await
        .unwrap();

    assert!(summary.deadline_reached);
    assert!(!summary.aborted);
    assert!(summary.counters.attempted >= 1 && summary.counters.attempted < 30);
    assert_eq!(
        lines(&OutputPaths::in_dir(dir.path()).unreachable).len() as u64,
        summary.counters.attempted
    );
}

#[tokio::test]
async fn limit_caps_the_run() {
    let dir = tempdir().unwrap();
    let runner = JobRunner::new(
        Arc::new(ScriptedProber::new(&[])),
        options(dir.path(), WriteMode::Truncate, 8),
    )
    .unwrap();

    let job = ProbeJob::new(vec![cidr("10.0.0.0/24")]).with_limit(Some(25));
    let summary = runner.run(&job, &RunControl::new(), |_| {}).await.unwrap();

    assert_eq!(summary.total, 25);
    assert_eq!(summary.counters.attempted, 25);
    assert_eq!(summary.unreachable_sample.len(), 10);
}

#[tokio::test]
async fn progress_callback_sees_the_final_counts() {
    let dir = tempdir().unwrap();
    let runner = JobRunner::new(
        Arc::new(ScriptedProber::new(&[("10.0.0.1", true)]).with_delay(Duration::from_millis(2))),
        options(dir.path(), WriteMode::Truncate, 2),
    )
    .unwrap();

    let last = Arc::new(std::sync::Mutex::new(None));
    let sink = Arc::clone(&last);
    runner
        .run(&ProbeJob::new(vec![cidr("10.0.0.0/29")]), &RunControl::new(), move |report| {
            *sink.lock().unwrap() = Some(*report);
        })
        .await
        .unwrap();

    let report = last.lock().unwrap().expect("no progress report");
    assert_eq!(report.snapshot.attempted, 6);
    assert_eq!(report.snapshot.succeeded, 1);
    assert_eq!(report.remaining(), 0);
}
