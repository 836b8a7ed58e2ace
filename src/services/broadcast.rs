// Common-services broadcast: UDP-dial the subnet broadcast address at a
// fixed well-known port set. A successful connect (not necessarily a
// reply) registers a Service keyed by the broadcast address.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::model::{Service, ServiceSource};
use crate::util::Cidr;

const PROBE_BUDGET: Duration = Duration::from_millis(500);

const WELL_KNOWN_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 67, 68, 80, 110, 123, 143, 161, 389, 443, 548, 631, 993, 995, 1900, 3389,
    5353, 5900, 8080, 9100,
];

pub async fn probe_subnet(subnet: Cidr) -> HashMap<Ipv4Addr, Vec<Service>> {
    let broadcast = subnet.broadcast();
    let mut services = Vec::new();
    for &port in WELL_KNOWN_PORTS {
        if dial(broadcast, port).await {
            services.push(Service {
                name: format!("broadcast:{port}"),
                service_type: "common-service".to_string(),
                domain: String::new(),
                port,
                protocol: "udp".to_string(),
                txt: HashMap::new(),
                source: ServiceSource::Probe,
            });
        }
    }
    if services.is_empty() {
        HashMap::new()
    } else {
        HashMap::from([(broadcast, services)])
    }
}

async fn dial(broadcast: Ipv4Addr, port: u16) -> bool {
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
        return false;
    };
    if let Err(_) = socket.set_broadcast(true) {
        return false;
    }
    let connect = timeout(PROBE_BUDGET, socket.connect(SocketAddrV4::new(broadcast, port)));
    connect.await.map(|r| r.is_ok()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_set_matches_fixed_list() {
        assert_eq!(WELL_KNOWN_PORTS.len(), 24);
        assert!(WELL_KNOWN_PORTS.contains(&9100));
    }
}
