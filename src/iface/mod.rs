// Interface Enumerator: lists UP, non-loopback IPv4 interfaces and resolves
// each one's default gateway via the Route Table Reader.

use std::net::Ipv4Addr;

use ipnetwork::IpNetwork;
use pnet_datalink as datalink;
use tracing::debug;

use crate::error::{NetweaverError, Result};
use crate::model::Interface;
use crate::osadapt::routes::longest_prefix_match;
use crate::osadapt::RoutingTable;
use crate::util::Cidr;

/// Enumerates interfaces in OS enumeration order. Fails only if no
/// interface has a usable IPv4 address — the one fatal condition in the
/// whole pipeline.
pub async fn enumerate_interfaces(routing_table: &dyn RoutingTable) -> Result<Vec<Interface>> {
    let routes = routing_table.routes().await;
    let mut interfaces = Vec::new();

    for nic in datalink::interfaces() {
        if !nic.is_up() || nic.is_loopback() {
            continue;
        }
        for ip_net in &nic.ips {
            if let IpNetwork::V4(v4) = ip_net {
                let subnet = Cidr::new(v4.ip(), v4.prefix())?;
                let gateway = resolve_gateway(&nic.name, v4.ip(), &routes, subnet);
                interfaces.push(Interface {
                    name: nic.name.clone(),
                    ip: v4.ip(),
                    subnet,
                    gateway,
                });
            }
        }
    }

    if interfaces.is_empty() {
        return Err(NetweaverError::NoInterfaces);
    }
    Ok(interfaces)
}

/// Finds the default route whose egress interface matches `name`, falling
/// back to the first usable host in the subnet when no route is found.
fn resolve_gateway(
    name: &str,
    ip: Ipv4Addr,
    routes: &[crate::model::Route],
    subnet: Cidr,
) -> Option<Ipv4Addr> {
    let by_name = routes
        .iter()
        .find(|r| r.destination.prefix() == 0 && r.interface == name)
        .and_then(|r| r.gateway);
    if by_name.is_some() {
        return by_name;
    }

    if let Some(route) = longest_prefix_match(routes, ip) {
        if route.destination.prefix() == 0 {
            if let Some(gw) = route.gateway {
                return Some(gw);
            }
        }
    }

    debug!(interface = name, "no default route matched, guessing first-host gateway");
    Some(subnet.first_host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Route;
    use crate::osadapt::FixtureRoutingTable;

    #[tokio::test]
    async fn resolve_gateway_falls_back_to_first_host() {
        let subnet: Cidr = "192.168.1.0/24".parse().unwrap();
        let gw = resolve_gateway("eth0", "192.168.1.100".parse().unwrap(), &[], subnet);
        assert_eq!(gw, Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn resolve_gateway_prefers_named_default_route() {
        let subnet: Cidr = "192.168.1.0/24".parse().unwrap();
        let routes = vec![Route {
            destination: "0.0.0.0/0".parse().unwrap(),
            gateway: Some("192.168.1.254".parse().unwrap()),
            interface: "eth0".to_string(),
            metric: 0,
        }];
        let gw = resolve_gateway("eth0", "192.168.1.100".parse().unwrap(), &routes, subnet);
        assert_eq!(gw, Some("192.168.1.254".parse().unwrap()));
    }

    #[tokio::test]
    async fn fixture_routing_table_returns_entries() {
        let table = FixtureRoutingTable::new(vec![]);
        assert!(table.routes().await.is_empty());
    }
}
