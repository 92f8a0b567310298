use std::time::Instant;

use anyhow::Context;
use colored::*;
use reachr_common::config::Config;
use reachr_common::CidrBlock;
use reachr_common::network::cidr;
use reachr_core::partition::{Partition, PartitionConfig, Partitioner};

use crate::commands::PartitionArgs;
use crate::mprint;
use crate::terminal::{colors, format, network_fmt, print};

const KEY_WIDTH: usize = 9;

pub fn partition(args: PartitionArgs, cfg: &Config) -> anyhow::Result<()> {
    let blocks = args.source.load()?;
    let config = PartitionConfig {
        floor_prefix: args.floor_prefix,
        tolerance: args.tolerance,
        max_rebalance_iterations: args.max_rebalance,
    };

    for (key, value) in request_lines(&blocks, args.jobs, cfg) {
        print::aligned_line(key, value, KEY_WIDTH);
    }

    let started = Instant::now();
    let partitioner = Partitioner::new(config)?;
    let result: Partition = partitioner.partition(&blocks, args.jobs)?;
    let elapsed = started.elapsed();

    let json = result.to_assignment().to_json()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("Assignment written to {}", path.display());
        }
        None => println!("{json}"),
    }

    print_jobs(&result, cfg);
    print_summary(&result, elapsed, cfg);
    Ok(())
}

/// What is about to be partitioned; decoration only, so nothing when quiet.
fn request_lines(blocks: &[CidrBlock], jobs: usize, cfg: &Config) -> Vec<(&'static str, String)> {
    if cfg.quiet > 0 {
        return Vec::new();
    }
    vec![
        ("Blocks", blocks.len().to_string()),
        ("Addresses", format::count(cidr::total_size(blocks))),
        ("Jobs", jobs.to_string()),
    ]
}

fn print_jobs(result: &Partition, cfg: &Config) {
    print::header("job assignment", cfg.quiet);

    for job in &result.jobs {
        let name = format!("job {} · {} addresses", job.index, format::count(job.load));
        print::tree_head(job.index, &name);

        if cfg.quiet == 0 {
            print::as_tree_one_level(&network_fmt::blocks_to_key_value_pair(&job.blocks));
        } else if cfg.quiet == 1 {
            print::print_status(network_fmt::block_span(&job.blocks).to_string());
        }
    }
}

fn print_summary(result: &Partition, elapsed: std::time::Duration, cfg: &Config) {
    let spread = result.max_load() - result.min_load();
    let output: ColoredString = format!(
        "{} jobs · target {} · spread {} ({})",
        result.jobs.len(),
        format::count(result.target_load.round() as u64),
        format::count(spread),
        format::percent(result.imbalance()),
    )
    .color(colors::TEXT_DEFAULT);

    match cfg.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&output);
            print::centerln(&format!(
                "{} units, {} rebalancing moves, {}",
                result.units,
                result.rebalance_moves,
                format::duration(elapsed).yellow()
            ));
            print::end_of_program();
        }
        _ => {
            mprint!();
            tracing::info!("{}", output);
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
