// Range Planner: turns interfaces into a prioritized, deduplicated set of
// ScanRange candidates for the chosen scan mode. Lower `priority` numbers
// are more specific and always win over wider ranges during merge
// (quick's own interface subnet is priority 1; a full RFC1918 block is
// priority 10).

use std::net::Ipv4Addr;

use crate::model::{Interface, RangeSource, ScanMode, ScanRange};
use crate::util::cidr::rfc1918_parent;
use crate::util::Cidr;

const FIREWALL_TEST_RANGES: &[&str] = &[
    "10.0.0.0/16",
    "10.1.0.0/16",
    "172.16.0.0/20",
    "192.168.1.0/24",
    "192.168.0.0/24",
];

/// Plans ranges for the four non-intelligent modes. `Intelligent` mode
/// seeds with just the interface subnets — the orchestrator calls the
/// `intelligent` module separately to produce the rest.
pub fn plan_ranges(interfaces: &[Interface], mode: ScanMode) -> Vec<ScanRange> {
    let mut ranges = quick_ranges(interfaces);

    match mode {
        ScanMode::Quick | ScanMode::Intelligent => {}
        ScanMode::Normal => ranges.extend(interfaces.iter().flat_map(normal_expansion)),
        ScanMode::Comprehensive => {
            ranges.extend(interfaces.iter().flat_map(normal_expansion));
            ranges.extend(interfaces.iter().filter_map(comprehensive_block));
        }
        ScanMode::FirewallTest => {
            ranges.extend(interfaces.iter().flat_map(normal_expansion));
            ranges.extend(interfaces.iter().flat_map(firewall_test_ranges));
        }
    }

    merge_ranges(ranges)
}

fn quick_ranges(interfaces: &[Interface]) -> Vec<ScanRange> {
    interfaces
        .iter()
        .map(|iface| {
            ScanRange::new(
                iface.subnet,
                1,
                RangeSource::Interface,
                format!("{} interface subnet", iface.name),
            )
        })
        .collect()
}

fn normal_expansion(iface: &Interface) -> Vec<ScanRange> {
    let Some(parent) = rfc1918_parent(iface.ip) else {
        return Vec::new();
    };
    let octets = iface.ip.octets();
    let mut out = Vec::new();

    match parent.prefix() {
        8 => {
            if let Ok(net16) = Cidr::new(iface.ip, 16) {
                out.push(ScanRange::new(net16, 3, RangeSource::Adjacent, "containing /16 block"));
            }
            if iface.subnet.prefix() < 16 {
                let base = Ipv4Addr::new(10, octets[1] & 0xF0, 0, 0);
                if let Ok(net12) = Cidr::new(base, 12) {
                    out.push(ScanRange::new(net12, 7, RangeSource::Adjacent, "containing /12 block"));
                }
            }
        }
        12 => {
            let base = Ipv4Addr::new(172, octets[1], octets[2] & 0xF0, 0);
            if let Ok(net20) = Cidr::new(base, 20) {
                out.push(ScanRange::new(net20, 3, RangeSource::Adjacent, "containing /20 block"));
            }
        }
        16 => {
            for offset in -2i32..=2 {
                if offset == 0 {
                    continue;
                }
                let third = octets[2] as i32 + offset;
                if !(0..=255).contains(&third) {
                    continue;
                }
                let base = Ipv4Addr::new(192, 168, third as u8, 0);
                if let Ok(net24) = Cidr::new(base, 24) {
                    out.push(ScanRange::new(net24, 5, RangeSource::Adjacent, "adjacent /24"));
                }
            }
        }
        _ => {}
    }
    out
}

fn comprehensive_block(iface: &Interface) -> Option<ScanRange> {
    let parent = rfc1918_parent(iface.ip)?;
    Some(ScanRange::new(parent, 10, RangeSource::Common, "full RFC1918 block"))
}

fn firewall_test_ranges(iface: &Interface) -> Vec<ScanRange> {
    let Some(parent) = rfc1918_parent(iface.ip) else {
        return Vec::new();
    };
    FIREWALL_TEST_RANGES
        .iter()
        .filter_map(|s| s.parse::<Cidr>().ok())
        .filter(|candidate| {
            rfc1918_parent(candidate.network())
                .map(|candidate_parent| candidate_parent == parent)
                .unwrap_or(false)
        })
        .map(|net| ScanRange::new(net, 5, RangeSource::Common, "firewall-test vetted range"))
        .collect()
}

/// Sorts ascending by priority (lower wins), narrower prefix first among
/// ties, then drops any range whose address span is fully contained
/// within an already-accepted range — and exact duplicates outright.
/// Re-sorted descending by priority (narrower-first on ties) for output.
pub fn merge_ranges(mut ranges: Vec<ScanRange>) -> Vec<ScanRange> {
    ranges.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.network.prefix().cmp(&a.network.prefix()))
    });

    let mut accepted: Vec<ScanRange> = Vec::new();
    for range in ranges {
        let duplicate = accepted.iter().any(|acc| acc.network == range.network);
        if duplicate {
            continue;
        }
        let contained = accepted
            .iter()
            .any(|acc| acc.network.prefix() < range.network.prefix() && acc.network.contains_range(&range.network));
        if !contained {
            accepted.push(range);
        }
    }

    accepted.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.network.prefix().cmp(&a.network.prefix()))
    });
    accepted
}
