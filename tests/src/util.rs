use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reachr_common::{CidrBlock, ProbeResult, ProbeTarget, Prober, ProxyEndpoint};
use reachr_core::engine::RunControl;

pub fn cidr(s: &str) -> CidrBlock {
    s.parse().unwrap()
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

/// Answers from a fixed table; anything not listed is refused.
pub struct ScriptedProber {
    reachable: HashMap<IpAddr, bool>,
    delay: Duration,
}

impl ScriptedProber {
    pub fn new(entries: &[(&str, bool)]) -> Self {
        Self {
            reachable: entries.iter().map(|(addr, up)| (ip(addr), *up)).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &ProbeTarget, _: Duration, _: Option<&ProxyEndpoint>) -> ProbeResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.reachable.get(&target.addr) {
            Some(true) => ProbeResult::reachable(*target),
            Some(false) => ProbeResult::unreachable(*target, "HTTP transport error: connection reset"),
            None => ProbeResult::unreachable(*target, "Connection refused (os error 111)"),
        }
    }
}

/// Tracks the peak number of concurrent probes; every target is reachable.
#[derive(Default)]
pub struct CountingProber {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingProber {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for CountingProber {
    async fn probe(&self, target: &ProbeTarget, _: Duration, _: Option<&ProxyEndpoint>) -> ProbeResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ProbeResult::reachable(*target)
    }
}

/// Pulls the plug on the run when its `after`-th probe starts.
pub struct AbortingProber {
    after: usize,
    calls: AtomicUsize,
    control: RunControl,
}

impl AbortingProber {
    pub fn new(after: usize, control: RunControl) -> Self {
        Self {
            after,
            calls: AtomicUsize::new(0),
            control,
        }
    }
}

#[async_trait]
impl Prober for AbortingProber {
    async fn probe(&self, target: &ProbeTarget, _: Duration, _: Option<&ProxyEndpoint>) -> ProbeResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.control.abort();
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        ProbeResult::reachable(*target)
    }
}
