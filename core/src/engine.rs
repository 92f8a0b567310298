//! Bounded-concurrency probe engine.
//!
//! Targets are pulled lazily from their iterator, so a `/8` is never
//! materialized. At most `concurrency` probes are in flight, and results are
//! yielded in completion order, not input order.
//!
//! Two stop signals are carried by [`RunControl`]:
//! - *stop admission*: no new target is started; in-flight probes finish and
//!   their results are still yielded.
//! - *abort*: the stream ends at once; in-flight probes are dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, Stream, StreamExt};
use reachr_common::{ConfigError, ProbeResult, ProbeTarget, Prober, ProxyEndpoint};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::network::timed_out;

pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Slack on top of the per-probe timeout before the engine gives up on a
/// prober that ignores its own deadline.
const TIMEOUT_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub proxy: Option<ProxyEndpoint>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Shared stop switches for one run. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    admission: CancellationToken,
    abort: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let in-flight probes finish but start no new ones.
    pub fn stop_admission(&self) {
        self.admission.cancel();
    }

    /// Drop everything in flight and end the result stream.
    pub fn abort(&self) {
        self.admission.cancel();
        self.abort.cancel();
    }

    pub fn is_admitting(&self) -> bool {
        !self.admission.is_cancelled()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Resolves once admission has been stopped, by either switch.
    pub async fn admission_stopped(&self) {
        self.admission.cancelled().await
    }
}

pub struct ProbeEngine {
    prober: Arc<dyn Prober>,
    settings: EngineSettings,
}

impl ProbeEngine {
    pub fn new(prober: Arc<dyn Prober>, settings: EngineSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self { prober, settings })
    }

    /// Probes every target, yielding one result per admitted target.
    pub fn run<I>(&self, targets: I, control: &RunControl) -> impl Stream<Item = ProbeResult> + Send + use<I>
    where
        I: IntoIterator<Item = ProbeTarget>,
        I::IntoIter: Send + 'static,
    {
        let prober = Arc::clone(&self.prober);
        let settings = Arc::new(self.settings.clone());
        let admission = control.admission.clone();

        stream::iter(targets)
            .take_while(move |_| future::ready(!admission.is_cancelled()))
            .map(move |target| {
                let prober = Arc::clone(&prober);
                let settings = Arc::clone(&settings);
                async move { probe_one(prober.as_ref(), target, &settings).await }
            })
            .buffer_unordered(self.settings.concurrency)
            .take_until(control.abort.clone().cancelled_owned())
    }
}

async fn probe_one(prober: &dyn Prober, target: ProbeTarget, settings: &EngineSettings) -> ProbeResult {
    let attempt = prober.probe(&target, settings.timeout, settings.proxy.as_ref());

    let result = match time::timeout(settings.timeout + TIMEOUT_GRACE, attempt).await {
        Ok(result) => result,
        Err(_elapsed) => ProbeResult::unreachable(target, timed_out(settings.timeout)),
    };

    if result.reachable {
        debug!("PASS {}", result.target);
    } else {
        debug!("FAIL {} ({})", result.target, result.diagnostic().unwrap_or("no detail"));
    }
    result
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reachr_common::CidrBlock;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps, then reports reachable for even last octets.
    #[derive(Default)]
    struct CountingProber {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, target: &ProbeTarget, _: Duration, _: Option<&ProxyEndpoint>) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let even = match target.addr {
                std::net::IpAddr::V4(v4) => v4.octets()[3] % 2 == 0,
                std::net::IpAddr::V6(_) => false,
            };
            if even {
                ProbeResult::reachable(*target)
            } else {
                ProbeResult::unreachable(*target, "odd")
            }
        }
    }

    struct HangingProber;

    #[async_trait]
    impl Prober for HangingProber {
        async fn probe(&self, _: &ProbeTarget, _: Duration, _: Option<&ProxyEndpoint>) -> ProbeResult {
            future::pending::<ProbeResult>().await
        }
    }

    fn targets(cidr: &str) -> Vec<ProbeTarget> {
        cidr.parse::<CidrBlock>().unwrap().hosts().map(ProbeTarget::from).collect()
    }

    fn engine(prober: Arc<dyn Prober>, concurrency: usize, timeout: Duration) -> ProbeEngine {
        let settings = EngineSettings { concurrency, timeout, proxy: None };
        ProbeEngine::new(prober, settings).unwrap()
    }

    #[test]
    fn settings_are_validated() {
        let zero = EngineSettings { concurrency: 0, ..Default::default() };
        assert_eq!(zero.validate(), Err(ConfigError::InvalidConcurrency));

        let instant = EngineSettings { timeout: Duration::ZERO, ..Default::default() };
        assert_eq!(instant.validate(), Err(ConfigError::InvalidTimeout));
    }

    #[tokio::test]
    async fn in_flight_probes_never_exceed_concurrency() {
        let prober = Arc::new(CountingProber { delay: Duration::from_millis(10), ..Default::default() });
        let engine = engine(prober.clone(), 4, Duration::from_secs(1));

        let results: Vec<ProbeResult> = engine.run(targets("10.0.0.0/26"), &RunControl::new()).collect().await;

        assert_eq!(results.len(), 62);
        assert!(prober.peak.load(Ordering::SeqCst) <= 4);
        assert!(prober.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn every_target_is_classified_once() {
        let prober = Arc::new(CountingProber::default());
        let engine = engine(prober, 8, Duration::from_secs(1));

        let mut results: Vec<ProbeResult> = engine.run(targets("10.0.0.0/28"), &RunControl::new()).collect().await;
        results.sort_by_key(|r| r.target);

        let reachable: Vec<String> = results.iter().filter(|r| r.reachable).map(|r| r.target.to_string()).collect();
        assert_eq!(results.len(), 14);
        assert_eq!(reachable.len(), 7);
        assert_eq!(reachable[0], "10.0.0.2");
        assert!(results.iter().filter(|r| !r.reachable).all(|r| r.diagnostic() == Some("odd")));
    }

    #[tokio::test]
    async fn hung_prober_is_cut_off_by_the_engine() {
        let engine = engine(Arc::new(HangingProber), 2, Duration::from_millis(50));
        let target = ProbeTarget::from(Ipv4Addr::new(192, 0, 2, 1));

        let results: Vec<ProbeResult> = engine.run(vec![target], &RunControl::new()).collect().await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].reachable);
        assert!(results[0].diagnostic().unwrap().starts_with("timed out"));
    }

    #[tokio::test]
    async fn stopping_admission_drains_in_flight_probes() {
        let prober = Arc::new(CountingProber { delay: Duration::from_millis(5), ..Default::default() });
        let engine = engine(prober.clone(), 2, Duration::from_secs(1));
        let control = RunControl::new();

        let mut stream = Box::pin(engine.run(targets("10.0.0.0/24"), &control));
        let first = stream.next().await;
        assert!(first.is_some());

        control.stop_admission();
        let rest: Vec<ProbeResult> = stream.collect().await;

        assert!(rest.len() <= 2, "admitted {} more probes", rest.len());
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1 + rest.len());
        assert!(!control.is_aborted());
    }

    #[tokio::test]
    async fn abort_ends_the_stream_without_waiting() {
        let engine = engine(Arc::new(HangingProber), 4, Duration::from_secs(30));
        let control = RunControl::new();

        let stopper = control.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            stopper.abort();
        });

        let results = time::timeout(
            Duration::from_secs(5),
            engine.run(targets("10.0.0.0/24"), &control).collect::<Vec<_>>(),
        )
        .await
        .expect("abort did not end the stream");

        assert!(results.is_empty());
        assert!(control.is_aborted());
        assert!(!control.is_admitting());
    }
}
