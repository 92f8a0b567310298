//! Partitioning and probing engine for `reachr`.
//!
//! [`partition`] splits an address space into balanced, disjoint jobs.
//! [`engine`], [`sink`] and [`progress`] run one job with bounded
//! concurrency and durable output; [`runner`] wires them together.

pub mod engine;
pub mod network;
pub mod partition;
pub mod progress;
pub mod runner;
pub mod sink;
