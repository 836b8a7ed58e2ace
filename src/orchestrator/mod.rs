// Scan Orchestrator: wires interface enumeration, range planning,
// per-host probing, DNS, service aggregation, vendor/DHCP enrichment and
// classification into the final frozen host set.
//
// The per-range host pipeline reports into a single message-passing sink
// (an mpsc channel) rather than an append-under-mutex list, per the
// message-passing redesign for the shared host slice.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::info;

use crate::classifier::Classifier;
use crate::dns::DnsResolver;
use crate::error::Result;
use crate::iface::enumerate_interfaces;
use crate::intelligent;
use crate::model::{Host, Interface, RangeSource, ScanMode, ScanRange};
use crate::util::Cidr;
use crate::osadapt::{Arp, DhcpLeases, FileDhcpLeases, Ping, RoutingTable, ShellArp, ShellPing, ShellRoutingTable};
use crate::planner::plan_ranges;
use crate::probe::{is_alive, sample_ports};
use crate::progress::ProgressTracker;
use crate::services;
use crate::vendor::VendorLookup;

const HOST_CONCURRENCY_CAP: usize = 100;

pub struct ScanConfig {
    pub mode: ScanMode,
    pub thoroughness: u8,
    pub enable_services: bool,
    pub enable_dns: bool,
    pub service_timeout: std::time::Duration,
    pub rules_path: Option<PathBuf>,
    /// Explicit `--target` CIDR: bypasses the planner and scans only this
    /// network. Interfaces are still enumerated, for gateway comparison
    /// and rendering.
    pub target: Option<Cidr>,
}

/// Runs the full discovery pipeline and returns the frozen host set plus
/// the interfaces used to group it for rendering.
pub async fn run(config: ScanConfig) -> Result<(Vec<Interface>, Vec<Host>)> {
    let routing_table = ShellRoutingTable;
    let interfaces = enumerate_interfaces(&routing_table).await?;
    info!(count = interfaces.len(), "enumerated interfaces");

    let mut scan_targets: Vec<ScanRange> = if let Some(target) = config.target {
        vec![ScanRange::new(target, 1, RangeSource::Discovered, "explicit --target override")]
    } else {
        plan_ranges(&interfaces, config.mode)
    };

    if config.target.is_none() && config.mode == ScanMode::Intelligent {
        let candidates = intelligent::discover(&interfaces, config.thoroughness).await;
        scan_targets = candidates
            .into_iter()
            .filter(|c| c.is_active)
            .map(|c| ScanRange::new(c.network, c.priority, c.source, "intelligent discovery candidate"))
            .collect();
    }

    let total_ips: u64 = scan_targets.iter().map(|r| r.network.usable_hosts().len() as u64).sum();
    let tracker = ProgressTracker::new(scan_targets.len() as u64, total_ips);
    let render_task = tokio::spawn(Arc::clone(&tracker).run());

    let ping: Arc<dyn Ping + Send + Sync> = Arc::new(ShellPing);
    let arp: Arc<dyn Arp + Send + Sync> = Arc::new(ShellArp);
    let mut hosts = run_ranges(&scan_targets, &interfaces, ping, arp, &tracker).await;

    tracker.finish();
    render_task.abort();

    if config.enable_dns {
        let resolver = DnsResolver::new();
        let ips: Vec<Ipv4Addr> = hosts.iter().map(|h| h.ip).collect();
        let resolved = resolver.resolve_bulk(&ips).await;
        let lookup: HashMap<Ipv4Addr, String> = resolved.into_iter().filter_map(|(ip, name)| name.map(|n| (ip, n))).collect();
        for host in &mut hosts {
            if host.hostname.is_none() {
                host.hostname = lookup.get(&host.ip).cloned();
            }
        }
        let (ok, total) = resolver.stats();
        info!(resolved = ok, attempted = total, "bulk DNS resolution complete");
    }

    if config.enable_services {
        for range in &scan_targets {
            let discovered = services::discover(range.network, config.service_timeout).await;
            merge_services(&mut hosts, discovered);
        }
    }

    let vendor_lookup = VendorLookup::load(true).await;
    for host in &mut hosts {
        if let Some(mac) = host.mac.clone() {
            host.mac_vendor = vendor_lookup.lookup(&mac).await;
        }
    }

    enrich_from_dhcp(&mut hosts, &FileDhcpLeases).await;

    let classifier = Classifier::load(config.rules_path.as_deref())?;
    for host in &mut hosts {
        classifier.classify(host);
    }

    Ok((interfaces, hosts))
}

async fn run_ranges(
    ranges: &[ScanRange],
    interfaces: &[Interface],
    ping: Arc<dyn Ping + Send + Sync>,
    arp: Arc<dyn Arp + Send + Sync>,
    tracker: &Arc<ProgressTracker>,
) -> Vec<Host> {
    let mut hosts = Vec::new();
    for range in ranges {
        let range_hosts = scan_range(range, interfaces, Arc::clone(&ping), Arc::clone(&arp), tracker).await;
        hosts.extend(range_hosts);
        tracker.complete_range();
    }
    hosts
}

/// Scans every usable host in `range` under a semaphore capped at 100
/// concurrent outstanding probes, feeding results into a single mpsc sink
/// rather than an append-under-mutex list.
async fn scan_range(
    range: &ScanRange,
    interfaces: &[Interface],
    ping: Arc<dyn Ping + Send + Sync>,
    arp: Arc<dyn Arp + Send + Sync>,
    tracker: &Arc<ProgressTracker>,
) -> Vec<Host> {
    let gateways: Vec<Ipv4Addr> = interfaces.iter().filter_map(|i| i.gateway).collect();
    let semaphore = Arc::new(Semaphore::new(HOST_CONCURRENCY_CAP));
    let (tx, mut rx) = mpsc::channel::<Host>(HOST_CONCURRENCY_CAP);

    let hosts_to_probe = range.network.usable_hosts();
    let sink = tokio::spawn(async move {
        let mut collected = Vec::new();
        while let Some(host) = rx.recv().await {
            collected.push(host);
        }
        collected
    });

    let mut tasks = Vec::new();
    for ip in hosts_to_probe {
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let gateways = gateways.clone();
        let tracker = Arc::clone(tracker);
        let ping = Arc::clone(&ping);
        let arp = Arc::clone(&arp);
        tasks.push(tokio::spawn(run_host_probe(ip, gateways, sem, tx, tracker, ping, arp)));
    }
    drop(tx);
    let _ = futures::future::join_all(tasks).await;
    sink.await.unwrap_or_default()
}

async fn run_host_probe(
    ip: Ipv4Addr,
    gateways: Vec<Ipv4Addr>,
    sem: Arc<Semaphore>,
    tx: mpsc::Sender<Host>,
    tracker: Arc<ProgressTracker>,
    ping: Arc<dyn Ping + Send + Sync>,
    arp: Arc<dyn Arp + Send + Sync>,
) {
    let _permit = sem.acquire_owned().await.ok();
    tracker.start_host();
    if is_alive(ip, ping.as_ref()).await {
        let ports = sample_ports(ip).await;
        let mac = arp.lookup(ip).await;
        let mut host = Host::new(ip);
        host.ports = ports;
        host.mac = mac;
        host.is_gateway = gateways.contains(&ip);
        let _ = tx.send(host).await;
    }
    tracker.finish_host();
}

fn merge_services(hosts: &mut [Host], discovered: HashMap<Ipv4Addr, services::DiscoveredServices>) {
    for host in hosts.iter_mut() {
        if let Some(found) = discovered.get(&host.ip) {
            host.services.extend(found.services.iter().cloned());
            for (k, v) in &found.upnp_info {
                host.upnp_info.entry(k.clone()).or_insert_with(|| v.clone());
            }
            if host.hostname.is_none() {
                host.hostname = found.hostname.clone();
            }
        }
    }
}

async fn enrich_from_dhcp(hosts: &mut [Host], reader: &dyn DhcpLeases) {
    let leases = reader.leases().await;
    for host in hosts.iter_mut() {
        let Some(lease) = leases.iter().find(|l| l.ip == host.ip) else {
            continue;
        };
        if host.mac.is_none() {
            host.mac = lease.mac.clone();
        }
        if host.hostname.is_none() {
            host.hostname = lease.hostname.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceSource;
    use crate::osadapt::dhcp::Lease;

    #[test]
    fn merge_services_appends_unions_upnp_and_adopts_hostname() {
        let ip: Ipv4Addr = "192.168.1.10".parse().unwrap();
        let mut hosts = vec![Host::new(ip)];
        let mut discovered = HashMap::new();
        discovered.insert(
            ip,
            services::DiscoveredServices {
                services: vec![crate::model::Service {
                    name: "svc".to_string(),
                    service_type: "t".to_string(),
                    domain: String::new(),
                    port: 80,
                    protocol: "tcp".to_string(),
                    txt: HashMap::new(),
                    source: ServiceSource::Mdns,
                }],
                upnp_info: HashMap::from([("SERVER".to_string(), "x".to_string())]),
                hostname: Some("webserver.local".to_string()),
            },
        );
        merge_services(&mut hosts, discovered);
        assert_eq!(hosts[0].services.len(), 1);
        assert_eq!(hosts[0].upnp_info.get("SERVER").map(String::as_str), Some("x"));
        assert_eq!(hosts[0].hostname.as_deref(), Some("webserver.local"));
    }

    #[test]
    fn merge_services_does_not_override_existing_hostname() {
        let ip: Ipv4Addr = "192.168.1.11".parse().unwrap();
        let mut host = Host::new(ip);
        host.hostname = Some("already-known.local".to_string());
        let mut hosts = vec![host];
        let discovered = HashMap::from([(
            ip,
            services::DiscoveredServices {
                services: vec![],
                upnp_info: HashMap::new(),
                hostname: Some("other.local".to_string()),
            },
        )]);
        merge_services(&mut hosts, discovered);
        assert_eq!(hosts[0].hostname.as_deref(), Some("already-known.local"));
    }

    #[tokio::test]
    async fn dhcp_enrichment_fills_missing_mac_and_hostname() {
        let ip: Ipv4Addr = "192.168.1.20".parse().unwrap();
        let mut hosts = vec![Host::new(ip)];
        let reader = crate::osadapt::FixtureDhcpLeases::new(vec![Lease {
            ip,
            mac: Some("aa:bb:cc:11:22:33".to_string()),
            hostname: Some("printer".to_string()),
        }]);
        enrich_from_dhcp(&mut hosts, &reader).await;
        assert_eq!(hosts[0].mac.as_deref(), Some("aa:bb:cc:11:22:33"));
        assert_eq!(hosts[0].hostname.as_deref(), Some("printer"));
    }
}
