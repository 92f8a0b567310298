//! Phases two and three of partitioning: greedy longest-processing-time
//! assignment, then a bounded rebalancing pass.
//!
//! LPT is the textbook heuristic for balanced multiprocessor scheduling. It is
//! not optimal; each job's load lands within one unit of the mean in the
//! common case, which is why units are made small before they get here.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::trace;

use super::subdivide::Unit;

/// One job's share while balancing.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    pub units: Vec<Unit>,
    pub load: u64,
}

impl Bucket {
    fn push(&mut self, unit: Unit) {
        self.load += unit.size();
        self.units.push(unit);
    }

    fn take(&mut self, idx: usize) -> Unit {
        let unit = self.units.swap_remove(idx);
        self.load -= unit.size();
        unit
    }
}

/// Largest unit first, each to the currently lightest job. Ties go to the
/// lowest job index.
pub fn assign_greedy(mut units: Vec<Unit>, jobs: usize) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = vec![Bucket::default(); jobs];
    if jobs == 0 {
        return buckets;
    }

    // Stable sort keeps subdivision order among equal sizes, so output is
    // deterministic for a given input.
    units.sort_by_key(|unit| Reverse(unit.size()));

    let mut lightest: BinaryHeap<Reverse<(u64, usize)>> =
        (0..jobs).map(|idx| Reverse((0, idx))).collect();

    for unit in units {
        let Some(Reverse((_, idx))) = lightest.pop() else {
            break;
        };
        buckets[idx].push(unit);
        lightest.push(Reverse((buckets[idx].load, idx)));
    }

    buckets
}

/// Moves the smallest unit from the heaviest job to the lightest until the
/// spread is within `allowed_spread`, no move improves it, or
/// `max_iterations` is spent. Returns the number of moves made.
pub fn rebalance(buckets: &mut [Bucket], allowed_spread: f64, max_iterations: usize) -> usize {
    let mut moves = 0;

    for _ in 0..max_iterations {
        let Some((heavy, light)) = extremes(buckets) else {
            break;
        };

        let spread = buckets[heavy].load - buckets[light].load;
        if spread as f64 <= allowed_spread {
            break;
        }

        let Some((idx, size)) = buckets[heavy]
            .units
            .iter()
            .enumerate()
            .map(|(idx, unit)| (idx, unit.size()))
            .min_by_key(|&(_, size)| size)
        else {
            break;
        };

        // Moving a unit at least as large as the spread only swaps which job is heavy.
        if size >= spread {
            break;
        }

        let unit = buckets[heavy].take(idx);
        buckets[light].push(unit);
        moves += 1;
        trace!(from = heavy, to = light, size, "rebalanced unit");
    }

    moves
}

/// Indices of the heaviest and lightest jobs, lowest index on ties.
fn extremes(buckets: &[Bucket]) -> Option<(usize, usize)> {
    let first = buckets.first()?;
    let mut heavy = (0, first.load);
    let mut light = (0, first.load);

    for (idx, bucket) in buckets.iter().enumerate().skip(1) {
        if bucket.load > heavy.1 {
            heavy = (idx, bucket.load);
        }
        if bucket.load < light.1 {
            light = (idx, bucket.load);
        }
    }

    Some((heavy.0, light.0))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
