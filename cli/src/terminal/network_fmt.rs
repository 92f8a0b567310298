use std::net::IpAddr;

use colored::*;
use reachr_common::CidrBlock;

use crate::terminal::{colors, format};

/// One tree row per block: the block and its usable address count.
pub fn blocks_to_key_value_pair(blocks: &[CidrBlock]) -> Vec<(String, ColoredString)> {
    blocks
        .iter()
        .map(|block| {
            let size = format!("{} addr", format::count(block.size())).color(colors::TEXT_DEFAULT);
            (block.to_string(), size)
        })
        .collect()
}

/// Sampled addresses as a single comma separated value.
pub fn sample_line(addrs: &[IpAddr], color: Color) -> ColoredString {
    if addrs.is_empty() {
        return "none".dimmed();
    }
    addrs
        .iter()
        .map(IpAddr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
        .color(color)
}

/// `10.0.0.0/24 (+3 more)` style summary of a job's blocks.
pub fn block_span(blocks: &[CidrBlock]) -> ColoredString {
    match blocks {
        [] => "empty".dimmed(),
        [only] => only.to_string().color(colors::CIDR),
        [first, rest @ ..] => format!("{} (+{} more)", first, rest.len()).color(colors::CIDR),
    }
}
