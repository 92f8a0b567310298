//! Shared model for `reachr`: address blocks, probe targets and results,
//! run counters and the error taxonomy.

pub mod config;
pub mod counters;
pub mod error;
pub mod network;
pub mod probe;

pub use counters::{CounterSnapshot, RunCounters};
pub use error::{ConfigError, SinkError};
pub use network::cidr::CidrBlock;
pub use network::proxy::ProxyEndpoint;
pub use network::range::{Hosts, Ipv4Range};
pub use probe::{ProbeResult, ProbeTarget, Prober};
