#![cfg(test)]
use std::collections::HashSet;
use std::net::Ipv4Addr;

use reachr_common::network::cidr;
use reachr_common::{CidrBlock, ConfigError};
use reachr_core::partition::{Assignment, PartitionConfig, Partitioner, split_to_prefix};

use crate::util::cidr;

fn expand(blocks: &[CidrBlock]) -> Vec<Ipv4Addr> {
    blocks.iter().flat_map(CidrBlock::hosts).collect()
}

/// Re-expands every job of `assignment` and checks it against `input`.
fn assert_exact_cover(input: &[CidrBlock], assignment: &Assignment) {
    let expected: HashSet<Ipv4Addr> = expand(input).into_iter().collect();
    let mut seen: HashSet<Ipv4Addr> = HashSet::new();

    for job in 0..assignment.jobs() {
        for addr in expand(&assignment.job(job).unwrap()) {
            assert!(seen.insert(addr), "{addr} assigned twice");
        }
    }
    assert_eq!(seen, expected, "assignment does not cover the input exactly");
}

#[test]
fn documentation_block_splits_into_two_single_address_jobs() {
    let input = vec![cidr("203.0.113.0/30")];
    let result = Partitioner::default().partition(&input, 2).unwrap();

    let loads: Vec<u64> = result.jobs.iter().map(|j| j.load).collect();
    assert_eq!(loads, vec![1, 1]);

    let assignment = result.to_assignment();
    assert_eq!(
        assignment,
        Assignment(vec![vec!["203.0.113.1/32".into()], vec!["203.0.113.2/32".into()]])
    );
}

#[test]
fn cdn_ranges_are_covered_exactly_and_balanced() {
    let input: Vec<CidrBlock> = [
        "173.245.48.0/20",
        "103.21.244.0/22",
        "103.22.200.0/22",
        "103.31.4.0/22",
        "141.101.64.0/18",
        "108.162.192.0/18",
        "190.93.240.0/20",
        "188.114.96.0/20",
        "197.234.240.0/22",
        "198.41.128.0/17",
        "162.158.0.0/15",
        "104.16.0.0/13",
        "104.24.0.0/14",
        "172.64.0.0/13",
        "131.0.72.0/22",
    ]
    .iter()
    .map(|s| cidr(s))
    .collect();

    for jobs in [2, 5, 12] {
        let result = Partitioner::default().partition(&input, jobs).unwrap();
        let assignment = Assignment::from_json(&result.to_assignment().to_json().unwrap()).unwrap();

        assert_eq!(assignment.jobs(), jobs);
        assert_exact_cover(&input, &assignment);
        assert!(result.imbalance() <= 0.05, "jobs={jobs} imbalance={}", result.imbalance());
        for job in &result.jobs {
            assert_eq!(job.expanded_size(), job.load);
        }
    }
}

#[test]
fn mixed_prefixes_including_degenerate_ones_are_covered() {
    let input = vec![
        cidr("10.0.0.0/22"),
        cidr("10.1.0.0/31"),
        cidr("10.1.0.9/32"),
        cidr("192.0.2.0/27"),
    ];
    let result = Partitioner::default().partition(&input, 7).unwrap();
    assert_exact_cover(&input, &result.to_assignment());
    assert_eq!(result.total, cidr::total_size(&input));
}

#[test]
fn floor_prefix_wins_over_balance() {
    let config = PartitionConfig {
        floor_prefix: 16,
        ..Default::default()
    };
    let input = vec![cidr("10.0.0.0/16")];
    let result = Partitioner::new(config).unwrap().partition(&input, 4).unwrap();

    let mut loads: Vec<u64> = result.jobs.iter().map(|j| j.load).collect();
    loads.sort_unstable();
    assert_eq!(loads, vec![0, 0, 0, 65_534]);
    assert_exact_cover(&input, &result.to_assignment());
}

#[test]
fn invalid_requests_are_configuration_errors() {
    let partitioner = Partitioner::default();
    assert_eq!(
        partitioner.partition(&[cidr("10.0.0.0/24")], 0).unwrap_err(),
        ConfigError::InvalidJobCount(0)
    );
    assert_eq!(partitioner.partition(&[], 3).unwrap_err(), ConfigError::EmptyInput);
    assert!(matches!(
        partitioner.partition(&[cidr("10.0.0.0/16"), cidr("10.0.4.0/24")], 2),
        Err(ConfigError::OverlappingBlocks { .. })
    ));
}

#[test]
fn assignment_job_lookup_is_bounds_checked() {
    let assignment = Assignment::from_json(r#"[["10.0.0.0/30"],[]]"#).unwrap();
    assert_eq!(assignment.job(0).unwrap(), vec![cidr("10.0.0.0/30")]);
    assert_eq!(assignment.job(1).unwrap(), vec![]);
    assert_eq!(
        assignment.job(2).unwrap_err(),
        ConfigError::JobOutOfRange { job: 2, jobs: 2 }
    );
    assert!(matches!(
        Assignment::from_json("{\"jobs\": 2}"),
        Err(ConfigError::MalformedAssignment(_))
    ));
}

#[test]
fn slash_16_splits_into_sixty_four_slash_22s() {
    let input = [cidr("10.0.0.0/16")];
    let blocks: Vec<CidrBlock> = split_to_prefix(&input, 22).collect();
    assert_eq!(blocks.len(), 64);
    assert!(blocks.iter().all(|b| b.prefix() == 22));
    assert_eq!(blocks[0], cidr("10.0.0.0/22"));
    assert_eq!(blocks[63], cidr("10.0.252.0/22"));
}
