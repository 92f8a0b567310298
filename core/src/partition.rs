//! # Address-Space Partitioner
//!
//! Splits a list of CIDR blocks into `jobs` balanced work assignments that
//! independent, non-communicating workers can probe.
//!
//! The pipeline has three phases:
//! 1. [`subdivide`]: halve blocks until each unit is small relative to the
//!    per-job target load (or reaches the floor prefix).
//! 2. [`balance::assign_greedy`]: longest-processing-time greedy assignment.
//! 3. [`balance::rebalance`]: bounded cleanup moves towards the tolerance.
//!
//! Every job's CIDR list re-expands, with the plain host expansion, to a
//! disjoint share of the input's usable addresses; together the shares cover
//! the input exactly.

pub mod balance;
pub mod subdivide;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reachr_common::{CidrBlock, ConfigError, network::cidr};

pub use subdivide::{Unit, split_to_prefix, subdivide};

/// Knobs for [`Partitioner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionConfig {
    /// No unit finer than this prefix is produced. Takes precedence over balance.
    pub floor_prefix: u8,
    /// Allowed max-min load spread, relative to the per-job target load.
    pub tolerance: f64,
    /// Cap on rebalancing moves.
    pub max_rebalance_iterations: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            floor_prefix: cidr::IPV4_BITS,
            tolerance: 0.05,
            max_rebalance_iterations: 10_000,
        }
    }
}

impl PartitionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor_prefix > cidr::IPV4_BITS {
            return Err(ConfigError::InvalidFloorPrefix(self.floor_prefix));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance.to_string()));
        }
        Ok(())
    }
}

/// The blocks one worker probes, in ascending address order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAssignment {
    pub index: usize,
    pub blocks: Vec<CidrBlock>,
    pub load: u64,
}

impl JobAssignment {
    fn from_bucket(index: usize, bucket: balance::Bucket) -> Self {
        let mut blocks: Vec<CidrBlock> = bucket.units.iter().flat_map(Unit::to_blocks).collect();
        blocks.sort_by_key(|block| u32::from(block.usable_range().start_addr));
        Self {
            index,
            blocks,
            load: bucket.load,
        }
    }

    /// Recomputes the load from the blocks themselves.
    pub fn expanded_size(&self) -> u64 {
        cidr::total_size(&self.blocks)
    }
}

/// A complete, static work assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub jobs: Vec<JobAssignment>,
    pub total: u64,
    pub target_load: f64,
    pub units: usize,
    pub rebalance_moves: usize,
}

impl Partition {
    pub fn max_load(&self) -> u64 {
        self.jobs.iter().map(|j| j.load).max().unwrap_or(0)
    }

    pub fn min_load(&self) -> u64 {
        self.jobs.iter().map(|j| j.load).min().unwrap_or(0)
    }

    /// `(max - min) / target`, or 0 for an empty partition.
    pub fn imbalance(&self) -> f64 {
        if self.target_load <= 0.0 {
            return 0.0;
        }
        (self.max_load() - self.min_load()) as f64 / self.target_load
    }

    pub fn to_assignment(&self) -> Assignment {
        Assignment(
            self.jobs
                .iter()
                .map(|job| job.blocks.iter().map(CidrBlock::to_string).collect())
                .collect(),
        )
    }
}

/// Machine-readable form: one list of CIDR strings per job, as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment(pub Vec<Vec<String>>);

impl Assignment {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::MalformedAssignment(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|e| ConfigError::MalformedAssignment(e.to_string()))
    }

    pub fn jobs(&self) -> usize {
        self.0.len()
    }

    /// Parsed blocks of one job.
    pub fn job(&self, job: usize) -> Result<Vec<CidrBlock>, ConfigError> {
        let entries = self.0.get(job).ok_or(ConfigError::JobOutOfRange {
            job,
            jobs: self.jobs(),
        })?;
        entries.iter().map(|entry| entry.parse()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    config: PartitionConfig,
}

impl Partitioner {
    pub fn new(config: PartitionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Produces exactly `jobs` assignments covering `blocks` disjointly.
    pub fn partition(&self, blocks: &[CidrBlock], jobs: usize) -> Result<Partition, ConfigError> {
        if jobs == 0 {
            return Err(ConfigError::InvalidJobCount(jobs));
        }
        if blocks.is_empty() {
            return Err(ConfigError::EmptyInput);
        }
        ensure_disjoint(blocks)?;

        let total: u64 = cidr::total_size(blocks);
        let target_load: f64 = total as f64 / jobs as f64;
        let threshold: u64 = ((target_load * self.config.tolerance).floor() as u64).max(1);

        let units: Vec<Unit> = subdivide(blocks, threshold, self.config.floor_prefix);
        let unit_count = units.len();
        debug!(total, jobs, threshold, units = unit_count, "subdivided input blocks");

        let mut buckets = balance::assign_greedy(units, jobs);
        let allowed_spread = target_load * self.config.tolerance;
        let rebalance_moves =
            balance::rebalance(&mut buckets, allowed_spread, self.config.max_rebalance_iterations);

        let partition = Partition {
            jobs: buckets
                .into_iter()
                .enumerate()
                .map(|(idx, bucket)| JobAssignment::from_bucket(idx, bucket))
                .collect(),
            total,
            target_load,
            units: unit_count,
            rebalance_moves,
        };

        info!(
            jobs,
            total,
            max = partition.max_load(),
            min = partition.min_load(),
            "partitioned address space"
        );

        Ok(partition)
    }
}

/// Rejects overlapping inputs; an address shared by two blocks would land in
/// two jobs.
fn ensure_disjoint(blocks: &[CidrBlock]) -> Result<(), ConfigError> {
    let mut sorted: Vec<&CidrBlock> = blocks.iter().collect();
    sorted.sort_by_key(|block| (u32::from(block.network()), block.prefix()));

    for pair in sorted.windows(2) {
        if pair[0].overlaps(pair[1]) {
            return Err(ConfigError::OverlappingBlocks {
                first: pair[0].to_string(),
                second: pair[1].to_string(),
            });
        }
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
