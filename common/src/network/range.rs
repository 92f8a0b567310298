use std::iter::FusedIterator;
use std::net::Ipv4Addr;

/// An inclusive, non-empty run of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    /// Builds a range, swapping the bounds if they arrive reversed.
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        if u32::from(start_addr) <= u32::from(end_addr) {
            Self { start_addr, end_addr }
        } else {
            Self { start_addr: end_addr, end_addr: start_addr }
        }
    }

    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end_addr)) - u64::from(u32::from(self.start_addr)) + 1
    }

    /// Always false; an `Ipv4Range` holds at least one address.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr: u32 = addr.into();
        u32::from(self.start_addr) <= addr && addr <= u32::from(self.end_addr)
    }

    /// The overlap of two ranges, if any.
    pub fn intersect(&self, other: &Ipv4Range) -> Option<Ipv4Range> {
        let start: u32 = u32::from(self.start_addr).max(u32::from(other.start_addr));
        let end: u32 = u32::from(self.end_addr).min(u32::from(other.end_addr));
        (start <= end).then(|| Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end)))
    }

    pub fn iter(&self) -> Hosts {
        Hosts {
            next: Some(self.start_addr.into()),
            end: self.end_addr.into(),
        }
    }
}

impl IntoIterator for Ipv4Range {
    type Item = Ipv4Addr;
    type IntoIter = Hosts;

    fn into_iter(self) -> Hosts {
        self.iter()
    }
}

/// Lazy ascending walk over an [`Ipv4Range`].
///
/// A clone continues from the same position. Call [`Ipv4Range::iter`] again
/// to walk the range from the beginning.
#[derive(Debug, Clone)]
pub struct Hosts {
    next: Option<u32>,
    end: u32,
}

impl Iterator for Hosts {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        let current = self.next?;
        self.next = if current < self.end { Some(current + 1) } else { None };
        Some(Ipv4Addr::from(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(next) => (self.end - next) as usize + 1,
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Hosts {}
impl FusedIterator for Hosts {}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
