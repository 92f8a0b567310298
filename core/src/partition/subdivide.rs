//! Phase one of partitioning: halve oversized blocks into work units.

use std::net::Ipv4Addr;

use reachr_common::network::cidr::{CidrBlock, IPV4_BITS};
use reachr_common::network::range::Ipv4Range;

/// A piece of one input block: a CIDR-aligned sub-block plus the usable span
/// of the original block that falls inside it.
///
/// The span differs from the sub-block's own usable range whenever the
/// sub-block touches an interior boundary of its parent, so a unit tracks it
/// explicitly instead of trusting the sub-block's network/broadcast rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    block: CidrBlock,
    span: Ipv4Range,
}

impl Unit {
    /// An unsplit input block.
    pub fn whole(block: CidrBlock) -> Self {
        Self {
            block,
            span: block.usable_range(),
        }
    }

    pub fn block(&self) -> CidrBlock {
        self.block
    }

    /// Addresses owned by this unit.
    pub fn size(&self) -> u64 {
        self.span.len()
    }

    /// Halves the unit, dropping a half that owns no address.
    pub fn split(&self) -> Vec<Unit> {
        let Some((low, high)) = self.block.halves() else {
            return vec![*self];
        };

        [low, high]
            .into_iter()
            .filter_map(|half| {
                half.full_range()
                    .intersect(&self.span)
                    .map(|span| Unit { block: half, span })
            })
            .collect()
    }

    /// CIDR blocks whose plain expansions are exactly this unit's span,
    /// in ascending address order.
    pub fn to_blocks(&self) -> Vec<CidrBlock> {
        if self.span == self.block.usable_range() {
            return vec![self.block];
        }

        if self.block.prefix() >= IPV4_BITS - 1 {
            return self.span.iter().map(CidrBlock::host).collect();
        }

        // The span covers the block's interior plus whichever ends it owns.
        let mut blocks: Vec<CidrBlock> = Vec::with_capacity(3);
        let network: Ipv4Addr = self.block.network();
        let broadcast: Ipv4Addr = self.block.broadcast();

        if self.span.contains(network) {
            blocks.push(CidrBlock::host(network));
        }
        blocks.push(self.block);
        if self.span.contains(broadcast) {
            blocks.push(CidrBlock::host(broadcast));
        }
        blocks
    }
}

/// Splits every block until each unit holds at most `threshold` addresses or
/// reaches `floor_prefix`.
///
/// Uses an explicit worklist, so depth is bounded by the prefix width rather
/// than the call stack. Output keeps input order, low half before high half.
pub fn subdivide(blocks: &[CidrBlock], threshold: u64, floor_prefix: u8) -> Vec<Unit> {
    let floor_prefix = floor_prefix.min(IPV4_BITS);
    let threshold = threshold.max(1);

    let mut stack: Vec<Unit> = blocks.iter().rev().copied().map(Unit::whole).collect();
    let mut units: Vec<Unit> = Vec::with_capacity(blocks.len());

    while let Some(unit) = stack.pop() {
        if unit.size() > threshold && unit.block.prefix() < floor_prefix {
            stack.extend(unit.split().into_iter().rev());
        } else {
            units.push(unit);
        }
    }

    units
}

/// Fixed-granularity split: every sub-block of `prefix` across all inputs,
/// produced lazily.
pub fn split_to_prefix(blocks: &[CidrBlock], prefix: u8) -> impl Iterator<Item = CidrBlock> + '_ {
    blocks.iter().flat_map(move |block| block.subnets(prefix))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
