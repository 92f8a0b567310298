//! # Probe Model
//!
//! The unit of work ([`ProbeTarget`]), its outcome ([`ProbeResult`]), and the
//! [`Prober`] capability every transport implements.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::network::proxy::ProxyEndpoint;

/// A single address to test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeTarget {
    pub addr: IpAddr,
}

impl ProbeTarget {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr }
    }

    /// The address as it appears in a URL host position.
    pub fn url_host(&self) -> String {
        match self.addr {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        }
    }
}

impl From<Ipv4Addr> for ProbeTarget {
    fn from(addr: Ipv4Addr) -> Self {
        Self::new(IpAddr::V4(addr))
    }
}

impl From<IpAddr> for ProbeTarget {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr)
    }
}

impl FromStr for ProbeTarget {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<IpAddr>().map(Self::new)
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

/// Outcome of one probe attempt. Created once per target, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub reachable: bool,
    pub diagnostic: Option<String>,
}

impl ProbeResult {
    pub fn reachable(target: ProbeTarget) -> Self {
        Self {
            target,
            reachable: true,
            diagnostic: None,
        }
    }

    pub fn unreachable(target: ProbeTarget, diagnostic: impl Into<String>) -> Self {
        Self {
            target,
            reachable: false,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// The diagnostic, if present and not blank.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }
}

/// One bounded-time reachability check.
///
/// Implementations must not fail: every transport-level problem becomes an
/// unreachable [`ProbeResult`] carrying the cause as its diagnostic.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
    ) -> ProbeResult;
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
