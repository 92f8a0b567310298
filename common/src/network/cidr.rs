//! # CIDR Blocks
//!
//! Parsing, sizing and expansion of IPv4 CIDR blocks.
//!
//! A block's *usable* addresses exclude the network and broadcast addresses,
//! except for `/31` and `/32` where every address in the block is usable.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::ConfigError;
use crate::network::range::{Hosts, Ipv4Range};

pub const IPV4_BITS: u8 = 32;

/// A network address plus prefix length. Host bits are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CidrBlock {
    network: Ipv4Addr,
    prefix: u8,
}

impl CidrBlock {
    /// Builds a block, rejecting addresses with host bits set.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, ConfigError> {
        let network = Ipv4Network::new(addr, prefix).map_err(|e| ConfigError::InvalidCidr {
            input: format!("{addr}/{prefix}"),
            reason: e.to_string(),
        })?;

        if network.network() != addr {
            return Err(ConfigError::InvalidCidr {
                input: format!("{addr}/{prefix}"),
                reason: format!("host bits set (did you mean {}/{prefix}?)", network.network()),
            });
        }

        Ok(Self { network: addr, prefix })
    }

    /// A single-address block.
    pub fn host(addr: Ipv4Addr) -> Self {
        Self { network: addr, prefix: IPV4_BITS }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | self.host_mask())
    }

    /// Every address in the block, network and broadcast included.
    pub fn full_range(&self) -> Ipv4Range {
        Ipv4Range::new(self.network, self.broadcast())
    }

    /// The addresses [`hosts`](Self::hosts) yields.
    pub fn usable_range(&self) -> Ipv4Range {
        if self.prefix >= IPV4_BITS - 1 {
            return self.full_range();
        }
        let network: u32 = self.network.into();
        let broadcast: u32 = self.broadcast().into();
        Ipv4Range::new(Ipv4Addr::from(network + 1), Ipv4Addr::from(broadcast - 1))
    }

    /// Number of usable addresses, computed without walking the block.
    pub fn size(&self) -> u64 {
        match self.prefix {
            32 => 1,
            31 => 2,
            p => (1u64 << (IPV4_BITS - p)) - 2,
        }
    }

    /// Usable addresses in ascending order. Lazy and restartable.
    pub fn hosts(&self) -> Hosts {
        self.usable_range().iter()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.full_range().contains(addr)
    }

    pub fn overlaps(&self, other: &CidrBlock) -> bool {
        self.full_range().intersect(&other.full_range()).is_some()
    }

    /// The two halves one prefix bit longer, or `None` for a `/32`.
    pub fn halves(&self) -> Option<(CidrBlock, CidrBlock)> {
        if self.prefix >= IPV4_BITS {
            return None;
        }
        let prefix = self.prefix + 1;
        let low = self.network;
        let high = Ipv4Addr::from(u32::from(self.network) | (1u32 << (IPV4_BITS - prefix)));
        Some((
            CidrBlock { network: low, prefix },
            CidrBlock { network: high, prefix },
        ))
    }

    /// Every sub-block of the given prefix, in ascending order.
    ///
    /// A prefix at or above the block's own returns the block itself.
    pub fn subnets(&self, prefix: u8) -> impl Iterator<Item = CidrBlock> + Clone + use<> {
        let prefix = prefix.clamp(self.prefix, IPV4_BITS);
        let count: u64 = 1u64 << (prefix - self.prefix);
        let step: u64 = 1u64 << (IPV4_BITS - prefix);
        let base: u64 = u32::from(self.network).into();

        (0..count).map(move |i| CidrBlock {
            network: Ipv4Addr::from((base + i * step) as u32),
            prefix,
        })
    }

    fn host_mask(&self) -> u32 {
        u32::MAX.checked_shr(u32::from(self.prefix)).unwrap_or(0)
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for CidrBlock {
    type Err = ConfigError;

    /// Parses `a.b.c.d/p`. A bare address is read as a `/32`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (ip_str, prefix_str) = s.split_once('/').unwrap_or((s, "32"));

        let addr = ip_str.parse::<IpAddr>().map_err(|e| ConfigError::InvalidCidr {
            input: s.to_string(),
            reason: format!("invalid address '{ip_str}': {e}"),
        })?;

        let IpAddr::V4(ipv4_addr) = addr else {
            return Err(ConfigError::UnsupportedFamily(s.to_string()));
        };

        let prefix = prefix_str.parse::<u8>().map_err(|e| ConfigError::InvalidCidr {
            input: s.to_string(),
            reason: format!("invalid prefix '{prefix_str}': {e}"),
        })?;

        CidrBlock::new(ipv4_addr, prefix).map_err(|err| match err {
            ConfigError::InvalidCidr { reason, .. } => ConfigError::InvalidCidr {
                input: s.to_string(),
                reason,
            },
            other => other,
        })
    }
}

/// Parses newline-delimited CIDR text. Blank lines and `#` comments are skipped.
pub fn parse_list(text: &str) -> Result<Vec<CidrBlock>, ConfigError> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(CidrBlock::from_str)
        .collect()
}

/// Total usable addresses across blocks.
pub fn total_size(blocks: &[CidrBlock]) -> u64 {
    blocks.iter().map(CidrBlock::size).sum()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> CidrBlock {
        s.parse().unwrap()
    }

    #[test]
    fn size_matches_expansion() {
        for prefix in 20..=32 {
            let block = CidrBlock::new(Ipv4Addr::new(10, 0, 0, 0), prefix).unwrap();
            assert_eq!(block.size(), block.hosts().count() as u64, "prefix /{prefix}");
        }
    }

    #[test]
    fn hosts_excludes_network_and_broadcast() {
        let ips: Vec<Ipv4Addr> = cidr("203.0.113.0/30").hosts().collect();
        assert_eq!(ips, vec![Ipv4Addr::new(203, 0, 113, 1), Ipv4Addr::new(203, 0, 113, 2)]);
    }

    #[test]
    fn hosts_of_slash_31_and_32_are_not_trimmed() {
        let pair: Vec<Ipv4Addr> = cidr("198.51.100.6/31").hosts().collect();
        assert_eq!(pair, vec![Ipv4Addr::new(198, 51, 100, 6), Ipv4Addr::new(198, 51, 100, 7)]);

        let single: Vec<Ipv4Addr> = cidr("198.51.100.9/32").hosts().collect();
        assert_eq!(single, vec![Ipv4Addr::new(198, 51, 100, 9)]);
    }

    #[test]
    fn hosts_is_restartable() {
        let block = cidr("192.0.2.0/29");
        assert_eq!(block.hosts().collect::<Vec<_>>(), block.hosts().collect::<Vec<_>>());
    }

    #[test]
    fn from_str_accepts_bare_address_as_host() {
        assert_eq!(cidr("1.2.3.4"), CidrBlock::host(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn from_str_rejects_bad_input() {
        assert!(matches!(
            "10.0.0.1/24".parse::<CidrBlock>(),
            Err(ConfigError::InvalidCidr { .. })
        ));
        assert!(matches!(
            "10.0.0.0/33".parse::<CidrBlock>(),
            Err(ConfigError::InvalidCidr { .. })
        ));
        assert!(matches!(
            "not-a-cidr".parse::<CidrBlock>(),
            Err(ConfigError::InvalidCidr { .. })
        ));
        assert!(matches!(
            "2606:4700::/32".parse::<CidrBlock>(),
            Err(ConfigError::UnsupportedFamily(_))
        ));
    }

    #[test]
    fn halves_split_the_full_range() {
        let (low, high) = cidr("10.0.0.0/24").halves().unwrap();
        assert_eq!(low, cidr("10.0.0.0/25"));
        assert_eq!(high, cidr("10.0.0.128/25"));
        assert!(cidr("10.0.0.1/32").halves().is_none());
    }

    #[test]
    fn subnets_of_slash_16_to_slash_22() {
        let subnets: Vec<CidrBlock> = cidr("10.0.0.0/16").subnets(22).collect();
        assert_eq!(subnets.len(), 64);
        assert!(subnets.iter().all(|b| b.prefix() == 22));
        assert_eq!(subnets[0], cidr("10.0.0.0/22"));
        assert_eq!(subnets[63], cidr("10.0.252.0/22"));
    }

    #[test]
    fn subnets_never_coarsen() {
        let block = cidr("10.0.0.0/24");
        assert_eq!(block.subnets(16).collect::<Vec<_>>(), vec![block]);
    }

    #[test]
    fn slash_zero_is_representable() {
        let all = cidr("0.0.0.0/0");
        assert_eq!(all.broadcast(), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(all.size(), (1u64 << 32) - 2);
    }

    #[test]
    fn parse_list_skips_blanks_and_comments() {
        let blocks = parse_list("173.245.48.0/20\n\n# comment\n103.21.244.0/22 # trailing\n").unwrap();
        assert_eq!(blocks, vec![cidr("173.245.48.0/20"), cidr("103.21.244.0/22")]);
    }
}
