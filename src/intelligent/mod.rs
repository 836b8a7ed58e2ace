// Intelligent Discovery: generates adjacent/common-subnet candidates and
// validates them via gateway probes, producing an active-subnet set.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::model::{Interface, RangeSource, SubnetCandidate};
use crate::probe::{tcp_liveness_probe, SCAN_TIMEOUT};
use crate::util::Cidr;

const ADJACENCY_16_OCTETS: &[u8] = &[0, 1, 10, 20, 50, 100, 168, 254];
const GATEWAY_PROBE_CAP: usize = 50;

/// Pool of globally common home/office subnets, ordered by how often
/// they're seen in the wild. Thoroughness picks a prefix of this list.
const COMMON_SUBNET_POOL: &[&str] = &[
    "192.168.1.0/24",
    "192.168.0.0/24",
    "10.0.0.0/24",
    "10.0.1.0/24",
    "192.168.2.0/24",
    "10.1.1.0/24",
    "172.16.0.0/24",
    "192.168.10.0/24",
    "192.168.100.0/24",
    "10.10.10.0/24",
    "192.168.50.0/24",
    "10.0.2.0/24",
    "192.168.3.0/24",
    "172.16.1.0/24",
    "10.1.0.0/24",
    "192.168.4.0/24",
    "192.168.20.0/24",
    "10.10.0.0/24",
    "192.168.5.0/24",
    "172.31.0.0/24",
    "192.168.8.0/24",
];

fn common_subnets_for(thoroughness: u8) -> &'static [&'static str] {
    let count = match thoroughness {
        1 => 4,
        2 => 8,
        3 => 12,
        4 => 16,
        _ => COMMON_SUBNET_POOL.len(),
    };
    &COMMON_SUBNET_POOL[..count.min(COMMON_SUBNET_POOL.len())]
}

fn truncation_cap(thoroughness: u8) -> usize {
    match thoroughness {
        1 => 5,
        2 => 10,
        3 => 20,
        4 => 40,
        _ => 80,
    }
}

/// Produces the truncated, sorted active-subnet set for `intelligent` mode.
pub async fn discover(interfaces: &[Interface], thoroughness: u8) -> Vec<SubnetCandidate> {
    let interface_candidates = interface_phase(interfaces);
    let adjacency_candidates = adjacency_phase(interfaces);
    let common_candidates = common_subnet_phase(&interface_candidates, thoroughness).await;

    let mut all: Vec<SubnetCandidate> = Vec::new();
    all.extend(interface_candidates);
    all.extend(adjacency_candidates);
    all.extend(common_candidates);

    gateway_probe_phase(&mut all).await;

    all.sort_by(|a, b| {
        b.is_active
            .cmp(&a.is_active)
            .then_with(|| b.priority.cmp(&a.priority))
    });
    all.truncate(truncation_cap(thoroughness));
    all
}

fn interface_phase(interfaces: &[Interface]) -> Vec<SubnetCandidate> {
    interfaces
        .iter()
        .map(|iface| {
            let network = iface.subnet.narrow_to(iface.ip, 24);
            SubnetCandidate {
                network,
                priority: 100,
                source: RangeSource::Interface,
                gateway_ip: iface.gateway,
                is_active: true,
            }
        })
        .collect()
}

fn adjacency_phase(interfaces: &[Interface]) -> Vec<SubnetCandidate> {
    let mut out = Vec::new();
    for iface in interfaces {
        let octets = iface.ip.octets();
        match iface.subnet.prefix() {
            24 => {
                for delta in [-1i32, 1] {
                    let third = octets[2] as i32 + delta;
                    if !(0..=255).contains(&third) {
                        continue;
                    }
                    let base = Ipv4Addr::new(octets[0], octets[1], third as u8, 0);
                    if let Ok(net) = Cidr::new(base, 24) {
                        out.push(candidate(net, 80, RangeSource::Adjacent));
                    }
                }
            }
            16 => {
                for &third in ADJACENCY_16_OCTETS {
                    let base = Ipv4Addr::new(octets[0], octets[1], third, 0);
                    if let Ok(net) = Cidr::new(base, 24) {
                        out.push(candidate(net, 80, RangeSource::Adjacent));
                    }
                }
            }
            _ => {}
        }
    }
    out
}

async fn common_subnet_phase(
    interface_candidates: &[SubnetCandidate],
    thoroughness: u8,
) -> Vec<SubnetCandidate> {
    let mut out = Vec::new();
    for raw in common_subnets_for(thoroughness) {
        let Ok(net) = raw.parse::<Cidr>() else { continue };
        if interface_candidates.iter().any(|c| c.network == net) {
            continue;
        }
        let active = liveness_probe_any(net).await;
        out.push(SubnetCandidate {
            network: net,
            priority: if active { 70 } else { 40 },
            source: RangeSource::Common,
            gateway_ip: None,
            is_active: active,
        });
    }
    out
}

async fn liveness_probe_any(net: Cidr) -> bool {
    for host in common_gateway_hosts(net) {
        if tcp_liveness_probe(host, SCAN_TIMEOUT).await {
            return true;
        }
    }
    false
}

fn candidate(network: Cidr, priority: i32, source: RangeSource) -> SubnetCandidate {
    SubnetCandidate {
        network,
        priority,
        source,
        gateway_ip: None,
        is_active: false,
    }
}

/// `{first-host, last-host, .10, .100, .50}` clipped to subnet membership.
fn common_gateway_hosts(net: Cidr) -> Vec<Ipv4Addr> {
    let octets = net.network().octets();
    let candidates = [
        net.first_host(),
        net.last_host(),
        Ipv4Addr::new(octets[0], octets[1], octets[2], 10),
        Ipv4Addr::new(octets[0], octets[1], octets[2], 100),
        Ipv4Addr::new(octets[0], octets[1], octets[2], 50),
    ];
    let mut seen = Vec::new();
    for ip in candidates {
        if net.contains(ip) && !seen.contains(&ip) {
            seen.push(ip);
        }
    }
    seen
}

/// Probes every non-interface candidate's gateway-host set, first success
/// wins, under a shared concurrency cap of 50.
async fn gateway_probe_phase(candidates: &mut [SubnetCandidate]) {
    let semaphore = Arc::new(Semaphore::new(GATEWAY_PROBE_CAP));
    let mut tasks = Vec::new();

    for (idx, c) in candidates.iter().enumerate() {
        if c.source == RangeSource::Interface {
            continue;
        }
        let hosts = common_gateway_hosts(c.network);
        let sem = Arc::clone(&semaphore);
        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok()?;
            for host in hosts {
                if tcp_liveness_probe(host, SCAN_TIMEOUT).await {
                    return Some((idx, host));
                }
            }
            None
        }));
    }

    for task in tasks {
        if let Ok(Some((idx, responder))) = task.await {
            candidates[idx].is_active = true;
            candidates[idx].gateway_ip = Some(responder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(ip: &str, prefix: u8) -> Interface {
        Interface {
            name: "eth0".to_string(),
            ip: ip.parse().unwrap(),
            subnet: Cidr::new(ip.parse().unwrap(), prefix).unwrap(),
            gateway: None,
        }
    }

    #[test]
    fn interface_phase_narrows_wide_subnet_to_slash_24() {
        let ifaces = vec![iface("10.212.5.4", 16)];
        let candidates = interface_phase(&ifaces);
        assert_eq!(candidates[0].network.prefix(), 24);
        assert_eq!(candidates[0].network.to_string(), "10.212.5.0/24");
        assert!(candidates[0].is_active);
    }

    #[test]
    fn adjacency_phase_slash_24_adds_both_siblings() {
        let ifaces = vec![iface("10.212.5.4", 24)];
        let candidates = adjacency_phase(&ifaces);
        let nets: Vec<String> = candidates.iter().map(|c| c.network.to_string()).collect();
        assert!(nets.contains(&"10.212.4.0/24".to_string()));
        assert!(nets.contains(&"10.212.6.0/24".to_string()));
    }

    #[test]
    fn gateway_hosts_clip_to_subnet_membership() {
        let net: Cidr = "192.168.1.0/30".parse().unwrap();
        let hosts = common_gateway_hosts(net);
        assert!(hosts.iter().all(|h| net.contains(*h)));
    }

    #[tokio::test]
    async fn thoroughness_caps_truncate_result() {
        let ifaces = vec![iface("10.212.5.4", 24)];
        let candidates = discover(&ifaces, 1).await;
        assert!(candidates.len() <= 5);
    }
}
