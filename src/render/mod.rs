// Thin renderer: groups the frozen host set by interface per the Renderer
// Contract. Routable hosts (outside every interface subnet) are grouped
// under the interface whose route has the longest-prefix match, keyed by
// their containing /24. This exists only to give the binary visible
// output — a full tree-art renderer is an external collaborator.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use colored::Colorize;

use crate::model::{Host, Interface, Route};
use crate::osadapt::routes::longest_prefix_match;
use crate::util::Cidr;

pub struct Grouping {
    pub interface: Interface,
    pub local_hosts: Vec<Host>,
    /// Routable hosts, keyed by their containing /24.
    pub routable: BTreeMap<Cidr, Vec<Host>>,
}

/// Groups hosts by interface. A host is "local" to the first interface
/// whose subnet contains its IP; otherwise it's "routable" under whichever
/// interface's route table entry has the longest-prefix match.
pub fn group_by_interface(interfaces: &[Interface], hosts: Vec<Host>, routes: &[Route]) -> Vec<Grouping> {
    let mut groupings: Vec<Grouping> = interfaces
        .iter()
        .map(|iface| Grouping {
            interface: iface.clone(),
            local_hosts: Vec::new(),
            routable: BTreeMap::new(),
        })
        .collect();

    for host in hosts {
        if let Some(idx) = interfaces.iter().position(|i| i.subnet.contains(host.ip)) {
            groupings[idx].local_hosts.push(host);
            continue;
        }
        if let Some(idx) = route_owner(interfaces, routes, host.ip) {
            let containing = containing_slash_24(host.ip);
            groupings[idx].routable.entry(containing).or_default().push(host);
        }
    }
    groupings
}

fn route_owner(interfaces: &[Interface], routes: &[Route], ip: Ipv4Addr) -> Option<usize> {
    let route = longest_prefix_match(routes, ip)?;
    interfaces.iter().position(|i| i.name == route.interface)
}

fn containing_slash_24(ip: Ipv4Addr) -> Cidr {
    Cidr::new(ip, 24).expect("prefix 24 always valid")
}

/// Renders the grouping as plain, colorized text lines.
pub fn render_text(groupings: &[Grouping]) -> String {
    let mut out = String::new();
    for grouping in groupings {
        out.push_str(&format!(
            "{} ({})\n",
            grouping.interface.name.bold(),
            grouping.interface.subnet
        ));
        for host in &grouping.local_hosts {
            out.push_str(&render_host_line(host));
        }
        for (network, hosts) in &grouping.routable {
            out.push_str(&format!("  via route → {}\n", network.to_string().dimmed()));
            for host in hosts {
                out.push_str(&format!("  {}", render_host_line(host)));
            }
        }
    }
    out
}

fn render_host_line(host: &Host) -> String {
    let marker = if host.is_gateway { "*".yellow().to_string() } else { " ".to_string() };
    let name = host.hostname.clone().unwrap_or_else(|| host.ip.to_string());
    format!(
        "  {marker} {:<15} {:<28} {}\n",
        host.ip.to_string().cyan(),
        name,
        host.device_type
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, ip: &str, prefix: u8) -> Interface {
        Interface {
            name: name.to_string(),
            ip: ip.parse().unwrap(),
            subnet: Cidr::new(ip.parse().unwrap(), prefix).unwrap(),
            gateway: None,
        }
    }

    #[test]
    fn host_inside_subnet_is_local() {
        let interfaces = vec![iface("eth0", "192.168.1.1", 24)];
        let host = Host::new("192.168.1.50".parse().unwrap());
        let groupings = group_by_interface(&interfaces, vec![host], &[]);
        assert_eq!(groupings[0].local_hosts.len(), 1);
        assert!(groupings[0].routable.is_empty());
    }

    #[test]
    fn host_outside_every_subnet_groups_under_route_owner() {
        let interfaces = vec![iface("eth0", "192.168.1.1", 24)];
        let routes = vec![Route {
            destination: "10.0.0.0/8".parse().unwrap(),
            gateway: Some("192.168.1.254".parse().unwrap()),
            interface: "eth0".to_string(),
            metric: 0,
        }];
        let host = Host::new("10.5.5.5".parse().unwrap());
        let groupings = group_by_interface(&interfaces, vec![host], &routes);
        assert!(groupings[0].local_hosts.is_empty());
        assert_eq!(groupings[0].routable.len(), 1);
        assert!(groupings[0].routable.contains_key(&"10.5.5.0/24".parse().unwrap()));
    }
}
