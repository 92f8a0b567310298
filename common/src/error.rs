//! Fatal error taxonomy.
//!
//! Per-target probe failures are not errors; they travel as
//! [`ProbeResult`](crate::probe::ProbeResult) data. Everything here stops a run.

use std::path::PathBuf;

use thiserror::Error;

/// Problems detected before any probing starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("job count must be at least 1 (got {0})")]
    InvalidJobCount(usize),

    #[error("no CIDR blocks were supplied")]
    EmptyInput,

    #[error("invalid CIDR '{input}': {reason}")]
    InvalidCidr { input: String, reason: String },

    #[error("unsupported address family in '{0}': only IPv4 blocks can be expanded")]
    UnsupportedFamily(String),

    #[error("input blocks {first} and {second} overlap")]
    OverlappingBlocks { first: String, second: String },

    #[error("invalid proxy '{input}': {reason}")]
    InvalidProxy { input: String, reason: String },

    #[error("proxy {proxy} is unavailable: {reason}")]
    ProxyUnavailable { proxy: String, reason: String },

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("probe timeout must be greater than zero")]
    InvalidTimeout,

    #[error("tolerance must be a finite, non-negative number (got {0})")]
    InvalidTolerance(String),

    #[error("floor prefix must be between 0 and 32 (got {0})")]
    InvalidFloorPrefix(u8),

    #[error("job {job} does not exist; the assignment has {jobs} job(s)")]
    JobOutOfRange { job: usize, jobs: usize },

    #[error("malformed assignment: {0}")]
    MalformedAssignment(String),

    #[error("invalid address limit '{0}': expected a positive number or 'all'")]
    InvalidLimit(String),
}

/// Durable output could not be written; the run must abort.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SinkError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            SinkError::Open { path, .. } | SinkError::Read { path, .. } | SinkError::Write { path, .. } => path,
        }
    }
}
